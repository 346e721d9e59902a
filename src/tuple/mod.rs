mod tuple;

pub use tuple::Tuple;
