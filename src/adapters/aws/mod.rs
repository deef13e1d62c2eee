//! AWS adapters: S3 storage, SQS job queue, DynamoDB task records.

pub mod dynamodb;
pub mod s3;
pub mod sqs;

pub use dynamodb::DynamoAdapter;
pub use s3::S3Adapter;
pub use sqs::SqsAdapter;
