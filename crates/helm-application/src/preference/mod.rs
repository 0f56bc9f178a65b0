mod writer;

pub use writer::PreferenceWriter;
