//! BDD coverage for scanning and pruning against the in-memory provider.

mod bdd_steps;
mod scenarios;
mod test_helpers;
