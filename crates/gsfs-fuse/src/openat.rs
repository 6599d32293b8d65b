//! Symlink-refusing opens under the content cache directory.
//!
//! The cache directory is writable by this process, so a symlink planted
//! inside it must never resolve outside it. `openat2` with
//! `RESOLVE_NO_SYMLINKS` refuses symlinks anywhere in the path; kernels
//! without it fall back to a plain `openat` with `O_NOFOLLOW`.

use std::ffi::CString;
use std::io;
use std::os::fd::{AsRawFd, FromRawFd, OwnedFd, RawFd};
use std::os::unix::ffi::OsStrExt;
use std::path::Path;

/// Open `path` relative to `base_dir`, refusing symlink traversal.
///
/// Passing an absolute `path` is a bug in the caller and fails with EINVAL.
/// The returned descriptor always carries `O_CLOEXEC`.
pub fn open_symlink_aware(base_dir: &Path, path: &Path, flags: libc::c_int) -> io::Result<OwnedFd> {
    if path.is_absolute() {
        return Err(io::Error::from_raw_os_error(libc::EINVAL));
    }

    let c_base = CString::new(base_dir.as_os_str().as_bytes())?;
    let base_fd = unsafe {
        libc::open(
            c_base.as_ptr(),
            libc::O_RDONLY | libc::O_DIRECTORY | libc::O_CLOEXEC,
        )
    };
    if base_fd < 0 {
        return Err(io::Error::last_os_error());
    }
    let base_fd = unsafe { OwnedFd::from_raw_fd(base_fd) };

    openat_no_symlinks(base_fd.as_raw_fd(), path, flags)
}

fn openat_no_symlinks(dirfd: RawFd, path: &Path, flags: libc::c_int) -> io::Result<OwnedFd> {
    let c_path = CString::new(path.as_os_str().as_bytes())?;

    // Subprocess spawning expects every fd to be close-on-exec.
    let mut how: libc::open_how = unsafe { std::mem::zeroed() };
    how.flags = (flags | libc::O_CLOEXEC) as u64;
    how.mode = 0;
    how.resolve = libc::RESOLVE_NO_SYMLINKS;
    let fd = unsafe {
        libc::syscall(
            libc::SYS_openat2,
            dirfd,
            c_path.as_ptr(),
            &mut how as *mut libc::open_how,
            std::mem::size_of::<libc::open_how>(),
        )
    };
    if fd >= 0 {
        return Ok(unsafe { OwnedFd::from_raw_fd(fd as RawFd) });
    }

    let err = io::Error::last_os_error();
    if err.raw_os_error() != Some(libc::ENOSYS) {
        return Err(err);
    }

    // Pre-5.6 kernel without openat2
    let fd = unsafe {
        libc::openat(
            dirfd,
            c_path.as_ptr(),
            flags | libc::O_NOFOLLOW | libc::O_CLOEXEC,
        )
    };
    if fd < 0 {
        return Err(io::Error::last_os_error());
    }
    Ok(unsafe { OwnedFd::from_raw_fd(fd) })
}
