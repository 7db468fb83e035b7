/*!

This is the long-form manual for `strategic_stv` and `stvmanip`.

## Ballot files

A dataset is a text file with one profile per line. A profile is a number of voters
followed by their common ranking:

```text
# Pliny's senate
102:1,2,3
101:2,1,3
100:3,2,1
```

Alternatives are strictly positive integers. The ranking lists them from the most
preferred to the least preferred, separated by commas. Alternatives between braces are
tied at the same rank: `3,{2,4},1` ranks 3 first, then 2 and 4 equally, then 1.
An alternative may not appear twice in the same ranking, and a ranking does not need to
mention every alternative: alternatives left out rank below all the others.

Empty lines and lines starting with `#` are ignored. By default, a malformed line stops
the program and reports its line number. With `--skip-malformed`, the line is reported in
the logs and ignored.

## Tabulation

The social choice functions are:

* `stv`: each round, every voter gives one vote to their top rank, split evenly between
  the tied alternatives of that rank. All the alternatives sharing the lowest score are
  removed from every ballot, and ballots that become empty are dropped. The procedure
  stops when all the remaining alternatives have the same score: they are the winners.
* `plurality`: the first round of `stv`, keeping the alternatives with the highest score.

Scores are exact fractions. More than one winner means the tie could not be broken.

Note that the tied last alternatives are eliminated together, unlike most STV variants.
There is no quota and no surplus transfer.

## Manipulation search

A coalition is the group of voters sharing one line of the dataset. For each coalition
and each candidate ranking, `stvmanip` lets `n = 1, 2, ...` voters of the coalition
submit the candidate while the others keep their truthful ranking, and reports the
cases where the coalition prefers the new winners.

Comparing two sets of winners requires an attitude towards ties:

* `optim`: the voter expects ties to be broken in their favour, and only looks at their
  preferred winner.
* `pessim`: the voter expects the worst, and only looks at their least preferred winner.

Winners that the voter did not rank count below everything else.

The candidate rankings are produced by:

* `perm`: every reordering of the ranks of the truthful ranking. Tied alternatives stay
  together.
* `perm-all`: every ranking without ties of all the alternatives of the election. The
  number of candidates grows as the factorial of the number of alternatives.

A configuration is named `<scf>_<comparator>_<generator>`, for example
`stv_pessim_perm`. `--all-configs` runs the eight combinations.

By default, the search for a candidate stops at the smallest `n` that works. With
`--no-stop-n`, every larger `n` that works is reported as well.

`--prune-satisfied` skips the coalitions whose top rank already contains every winner:
they cannot do better.

`--parallel` spreads the candidates of each coalition over a pool of threads
(`--threads` workers, or one per core). The records are the same as in sequential mode.

## Configuration file

The options can also be read from a JSON file passed with `--config`. Options given on
the command line take precedence.

```text
{
  "dataset": "pliny.toi",
  "scf": "plurality",
  "comparator": "pessim",
  "generator": "perm",
  "minimalNStop": true,
  "parallel": false,
  "threads": 4,
  "outputDirectory": "results",
  "skipMalformed": false,
  "pruneSatisfied": false
}
```

A relative `dataset` path is resolved against the directory of the configuration file.

## Output

Without `--out`, the summary of each configuration is printed in JSON. With
`--out <dir>`, each configuration writes in
`<dir>/<dataset name>/<configuration name>/` (with a `__no-stop-n` suffix when relevant):

* `results.json`: every record found, with the truthful ranking, the ranking submitted
  instead, the number of voters who switched, the winners before and after, and the
  modified election.
* `summary.json`: the configuration, the counts of records and of distinct rankings, the
  SHA-256 digest of the dataset and the start, end and duration of the search.

A configuration whose directory already exists is skipped, unless `--force` is passed.

`--reference <file>` compares the results with a previously computed `summary.json` and
fails if they differ.
 */
