mod scheduler_tests;
mod worker_tests;
