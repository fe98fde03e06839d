pub mod persistent;
pub mod treap;
