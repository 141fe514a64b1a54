pub mod brute_force_index;
pub mod index_factory;
pub mod matrix_index;
