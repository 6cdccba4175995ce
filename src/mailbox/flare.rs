//! Сигнал пробуждения, видимый ОС.
//!
//! На unix это пара неблокирующих сокетов: запись одного байта делает
//! читающий конец готовым для `select`/`poll`/epoll, вычитывание байта
//! снимает готовность. Состояние (зажжён/погашен) отслеживает владелец,
//! здесь только операции над дескриптором.

#[cfg(unix)]
mod imp {
    use std::{
        io::{self, Read, Write},
        os::{
            fd::{AsFd, AsRawFd, BorrowedFd, RawFd},
            unix::net::UnixStream,
        },
    };

    #[derive(Debug)]
    pub struct Flare {
        reader: UnixStream,
        writer: UnixStream,
    }

    impl Flare {
        pub fn new() -> io::Result<Self> {
            let (reader, writer) = UnixStream::pair()?;
            reader.set_nonblocking(true)?;
            writer.set_nonblocking(true)?;
            Ok(Self { reader, writer })
        }

        /// Делает дескриптор готовым к чтению.
        pub fn fire(&self) -> io::Result<()> {
            loop {
                match (&self.writer).write(&[1]) {
                    Ok(_) => return Ok(()),
                    // Буфер полон: дескриптор уже готов.
                    Err(e) if e.kind() == io::ErrorKind::WouldBlock => return Ok(()),
                    Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                    Err(e) => return Err(e),
                }
            }
        }

        /// Вычитывает всё, что накопилось, снимая готовность.
        pub fn extinguish(&self) -> io::Result<()> {
            let mut buf = [0u8; 64];
            loop {
                match (&self.reader).read(&mut buf) {
                    Ok(0) => return Ok(()),
                    Ok(_) => continue,
                    Err(e) if e.kind() == io::ErrorKind::WouldBlock => return Ok(()),
                    Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                    Err(e) => return Err(e),
                }
            }
        }
    }

    #[cfg(test)]
    impl Flare {
        /// Закрывает пишущий конец: последующие `fire` падают с `BrokenPipe`.
        pub fn shut_writer(&self) -> io::Result<()> {
            self.writer.shutdown(std::net::Shutdown::Write)
        }
    }

    impl AsRawFd for Flare {
        fn as_raw_fd(&self) -> RawFd {
            self.reader.as_raw_fd()
        }
    }

    impl AsFd for Flare {
        fn as_fd(&self) -> BorrowedFd<'_> {
            self.reader.as_fd()
        }
    }
}

#[cfg(not(unix))]
mod imp {
    use std::io;

    /// Заглушка: без unix-сокетов почтовый ящик не опрашиваемый.
    #[derive(Debug)]
    pub struct Flare;

    impl Flare {
        pub fn new() -> io::Result<Self> {
            Err(io::Error::new(
                io::ErrorKind::Unsupported,
                "pollable mailboxes require unix",
            ))
        }

        pub fn fire(&self) -> io::Result<()> {
            Ok(())
        }

        pub fn extinguish(&self) -> io::Result<()> {
            Ok(())
        }
    }
}

pub use imp::Flare;

#[cfg(all(test, unix))]
mod tests {
    use std::{
        io::{self, Read},
        os::{
            fd::{AsFd, AsRawFd},
            unix::net::UnixStream,
        },
    };

    use super::*;

    /// Второй читающий конец того же сокета; чтение из него разрушающее.
    fn probe(flare: &Flare) -> UnixStream {
        let owned = flare.as_fd().try_clone_to_owned().unwrap();
        UnixStream::from(owned)
    }

    fn would_block(stream: &mut UnixStream) -> bool {
        let mut buf = [0u8; 1];
        matches!(stream.read(&mut buf), Err(e) if e.kind() == io::ErrorKind::WouldBlock)
    }

    #[test]
    fn test_fire_makes_descriptor_readable() {
        let flare = Flare::new().unwrap();
        let mut reader = probe(&flare);
        assert!(would_block(&mut reader));

        flare.fire().unwrap();
        let mut buf = [0u8; 8];
        assert_eq!(reader.read(&mut buf).unwrap(), 1);
        assert!(flare.as_raw_fd() >= 0);
    }

    /// Повторный fire не копит готовность, одного extinguish достаточно.
    #[test]
    fn test_repeated_fire_single_extinguish() {
        let flare = Flare::new().unwrap();
        for _ in 0..10 {
            flare.fire().unwrap();
        }
        flare.extinguish().unwrap();
        assert!(would_block(&mut probe(&flare)));
    }
}
