mod dependency_tests;
mod loader_tests;
mod registry_tests;
