use std::fs::{File, OpenOptions};
use std::io;
use std::mem;
use std::os::unix::fs::OpenOptionsExt;
use std::os::unix::io::AsRawFd;
use std::path::Path;

use tracing::{debug, warn};

/// The serial adapter's tty, open for raw reading.
///
/// Dropping it puts back the terminal settings it found.
pub struct Tty {
    file: File,
    saved: Option<libc::termios>,
}

impl Tty {
    /// Another handle on the same file, for the reading thread.
    pub fn reader(&self) -> io::Result<File> {
        self.file.try_clone()
    }
}

impl Drop for Tty {
    fn drop(&mut self) {
        if let Some(saved) = &self.saved {
            if unsafe { libc::tcsetattr(self.file.as_raw_fd(), libc::TCSANOW, saved) } != 0 {
                warn!("tty: settings not restored: {}", io::Error::last_os_error());
            } else {
                debug!("tty: settings restored");
            }
        }
    }
}

/// Open `path` and switch it to raw mode.
///
/// Anything that isn't a terminal (a capture file, a fifo) is read as it is.
pub fn open(path: &Path) -> io::Result<Tty> {
    let file = OpenOptions::new()
        .read(true)
        .custom_flags(libc::O_NOCTTY)
        .open(path)?;
    let fd = file.as_raw_fd();

    let mut termios: libc::termios = unsafe { mem::zeroed() };
    if unsafe { libc::tcgetattr(fd, &mut termios) } != 0 {
        let e = io::Error::last_os_error();
        if e.raw_os_error() == Some(libc::ENOTTY) {
            debug!("{}: not a tty, reading as is", path.display());
            return Ok(Tty { file, saved: None });
        }
        return Err(e);
    }
    let saved = termios;

    unsafe { libc::cfmakeraw(&mut termios) };
    termios.c_cc[libc::VMIN] = 1;
    termios.c_cc[libc::VTIME] = 0;

    if unsafe { libc::tcsetattr(fd, libc::TCSANOW, &termios) } != 0 {
        return Err(io::Error::last_os_error());
    }
    let tty = Tty { file, saved: Some(saved) };

    // Whatever sat in the driver's buffer predates us.
    if unsafe { libc::tcflush(fd, libc::TCIFLUSH) } != 0 {
        return Err(io::Error::last_os_error());
    }

    debug!("{}: raw mode", path.display());
    Ok(tty)
}
