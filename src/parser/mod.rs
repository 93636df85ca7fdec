pub mod events;
pub mod header_parser;
pub mod location;
pub mod primitive_parser;
pub mod record_decoder;
pub mod tef_parser;
pub mod tef_types;
pub mod tuning;
