//! Queue consumer: pulls payloads off RabbitMQ, decodes them and hands them
//! to the dispatch pool.

pub mod amqp;
pub mod ingest;
