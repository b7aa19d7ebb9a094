pub mod pipeline_logger;
pub mod transcribe_job_use_case;
