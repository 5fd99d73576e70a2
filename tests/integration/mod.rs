mod key_tests;
mod run_tests;
