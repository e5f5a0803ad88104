use flate2::{Compression, write::GzEncoder};
use std::{
    fs::File,
    io::{BufWriter, Write},
};

pub enum FileDescriptor {
    Plain(BufWriter<File>),
    Gzip(GzEncoder<File>),
}

impl std::io::Write for FileDescriptor {
    fn write(&mut self, data: &[u8]) -> std::io::Result<usize> {
        match self {
            Self::Plain(w) => w.write(data),
            Self::Gzip(w) => w.write(data),
        }
    }

    fn flush(&mut self) -> std::io::Result<()> {
        match self {
            Self::Plain(w) => w.flush(),
            Self::Gzip(w) => w.flush(),
        }
    }
}

impl FileDescriptor {
    /// Wraps a freshly created file
    pub fn new(gzip: bool, fd: File) -> Self {
        if gzip {
            let compression = Compression::new(5);
            Self::Gzip(GzEncoder::new(fd, compression))
        } else {
            Self::Plain(BufWriter::new(fd))
        }
    }

    /// Flushes and terminates the stream (gzip trailer).
    /// Nothing should be written past this point.
    pub fn finish(&mut self) -> std::io::Result<()> {
        match self {
            Self::Plain(w) => w.flush(),
            Self::Gzip(w) => {
                w.try_finish()?;
                w.get_mut().flush()
            },
        }
    }
}
