mod submit;
pub use submit::SubmitSpec;
