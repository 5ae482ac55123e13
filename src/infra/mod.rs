pub mod csv_output_adapter;
pub mod csv_source_adapter;
pub mod in_memory_output_adapter;
