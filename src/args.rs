use clap::Parser;

/// Searches ranked elections for strategic-voting manipulations.
#[derive(Parser, Debug, Clone)]
#[clap(author, version, about, long_about = None)]
pub struct Args {
    /// (file path) The dataset: one `<count>:<ranking>` profile per line, for example `12:3,{1,2}`.
    /// Setting this option overrides the dataset that may be specified with the --config option.
    #[clap(short, long, value_parser)]
    pub input: Option<String>,

    /// (file path, optional) A JSON file with the options of the run. Options passed on the command
    /// line take precedence over the ones in the file.
    #[clap(short, long, value_parser)]
    pub config: Option<String>,

    /// (stv or plurality, default stv) The social choice function.
    #[clap(long, value_parser)]
    pub scf: Option<String>,

    /// (optim or pessim, default pessim) How voters compare tied outcomes.
    #[clap(long, value_parser)]
    pub comparator: Option<String>,

    /// (perm or perm-all, default perm) The rankings tried by each coalition.
    #[clap(long, value_parser)]
    pub generator: Option<String>,

    /// If passed, runs every combination of social choice function, comparator and generator.
    #[clap(long, takes_value = false)]
    pub all_configs: bool,

    /// If passed, keeps searching larger coalitions after the smallest successful one.
    #[clap(long, takes_value = false)]
    pub no_stop_n: bool,

    /// If passed, the candidates of each coalition are tried on a pool of threads.
    #[clap(long, takes_value = false)]
    pub parallel: bool,

    /// (number, optional) The number of threads in parallel mode. Defaults to the number of cores.
    #[clap(long, value_parser)]
    pub threads: Option<usize>,

    /// If passed, stops after the first manipulation found.
    #[clap(long, takes_value = false)]
    pub first: bool,

    /// If passed, malformed lines of the dataset are logged and ignored instead of stopping the program.
    #[clap(long, takes_value = false)]
    pub skip_malformed: bool,

    /// If passed, skips the coalitions that already rank every winner first.
    #[clap(long, takes_value = false)]
    pub prune_satisfied: bool,

    /// (directory path or empty) If specified, the results are written in JSON format under this directory.
    /// Otherwise, the summary is printed on the standard output.
    #[clap(short, long, value_parser)]
    pub out: Option<String>,

    /// If passed, results already present in the output directory are computed again and overwritten.
    #[clap(long, takes_value = false)]
    pub force: bool,

    /// (file path) A reference summary in JSON format. If provided, stvmanip checks that the results
    /// match the reference.
    #[clap(short, long, value_parser)]
    pub reference: Option<String>,

    // Other arguments
    /// If passed as an argument, will turn on verbose logging to the standard output.
    #[clap(long, takes_value = false)]
    pub verbose: bool,
}
