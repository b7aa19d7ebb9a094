pub mod job_output;
pub mod job_request;
pub mod pipeline_error;
