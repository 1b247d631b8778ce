// Music library
// Directory scanning for playlist building

pub mod scanner;

pub use scanner::DirectoryScanner;
