//! World-level scenario tests

mod world_scenarios;
