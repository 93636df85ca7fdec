pub mod assembler;
pub mod reading_list;
