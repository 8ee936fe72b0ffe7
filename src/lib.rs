pub mod blackbody;
pub mod bolfit;
pub mod bolfit_errors;
pub mod constants;
pub mod cosmology;
pub mod env_state;
pub mod estimator;
pub mod filters;
pub mod fitting;
pub mod gaussian_process;
pub mod output;
pub mod photometry;
pub mod plot;
pub mod templates;
