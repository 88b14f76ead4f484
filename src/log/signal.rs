//! Signal hooks
//!
//! POSIX only. Termination signals drain the logger through the
//! async-signal-safe path before the default action runs again; crash
//! signals additionally leave a backtrace in `<exe>.fatal`. The shutdown
//! spin sleeps through `select`, which is async-signal-safe, instead of any
//! locking primitive.

#[cfg(unix)]
pub(crate) fn install() {
    unsafe {
        hook(libc::SIGINT, on_signal);
        hook(libc::SIGTERM, on_signal);
        hook(libc::SIGQUIT, on_signal);

        hook(libc::SIGSEGV, on_failure);
        hook(libc::SIGABRT, on_failure);
        hook(libc::SIGFPE, on_failure);
        hook(libc::SIGBUS, on_failure);
    }
}

#[cfg(not(unix))]
pub(crate) fn install() {}

#[cfg(unix)]
unsafe fn hook(sig: libc::c_int, handler: extern "C" fn(libc::c_int)) {
    libc::signal(sig, handler as usize as libc::sighandler_t);
}

#[cfg(unix)]
extern "C" fn on_signal(sig: libc::c_int) {
    if let Some(lg) = super::try_logger() {
        lg.safe_stop();
    }
    unsafe {
        libc::signal(sig, libc::SIG_DFL);
        libc::raise(sig);
    }
}

#[cfg(unix)]
extern "C" fn on_failure(sig: libc::c_int) {
    if let Some(lg) = super::try_logger() {
        lg.on_failure();
    }
    unsafe {
        libc::signal(sig, libc::SIG_DFL);
        libc::raise(sig);
    }
}

/// Sleep 8 ms without touching any lock.
#[cfg(unix)]
pub(crate) fn sleep_tick() {
    unsafe {
        let mut tv = libc::timeval {
            tv_sec: 0,
            tv_usec: 8000,
        };
        libc::select(
            0,
            std::ptr::null_mut(),
            std::ptr::null_mut(),
            std::ptr::null_mut(),
            &mut tv,
        );
    }
}

#[cfg(not(unix))]
pub(crate) fn sleep_tick() {
    std::thread::sleep(std::time::Duration::from_millis(8));
}
