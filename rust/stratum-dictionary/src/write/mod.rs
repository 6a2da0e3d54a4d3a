mod writer;

pub use writer::TieredDictionaryWriter;
