pub mod io;

/// Reset SIGPIPE to default behavior (SIG_DFL).
/// Rust sets SIGPIPE to SIG_IGN by default, but command-line tools are
/// expected to die on a closed pipe (exit code 141 = 128 + 13).
/// This must be called at the start of main().
#[inline]
pub fn reset_sigpipe() {
    #[cfg(unix)]
    unsafe {
        libc::signal(libc::SIGPIPE, libc::SIG_DFL);
    }
}

/// Format an IO error message without the "(os error N)" suffix.
/// GNU tools print e.g. "No such file or directory" while Rust's
/// Display impl adds " (os error 2)". This strips the suffix for compat.
pub fn io_error_msg(e: &std::io::Error) -> String {
    if let Some(raw) = e.raw_os_error() {
        let os_err = std::io::Error::from_raw_os_error(raw);
        let msg = format!("{}", os_err);
        msg.replace(&format!(" (os error {})", raw), "")
    } else {
        format!("{}", e)
    }
}

/// Parse a byte count with an optional multiplicative suffix:
/// B=1, K=1024, and so on for M, G, T, P, E.
pub fn parse_size(s: &str) -> Result<usize, String> {
    let bytes = s.as_bytes();
    let digits = bytes
        .iter()
        .position(|b| !b.is_ascii_digit())
        .unwrap_or(bytes.len());
    if digits == 0 {
        return Err(format!("invalid argument '{}'", s));
    }

    let value: u64 = s[..digits]
        .parse()
        .map_err(|_| format!("invalid argument '{}'", s))?;

    let factor: u64 = match &s[digits..] {
        "" | "B" => 1,
        "K" => 1 << 10,
        "M" => 1 << 20,
        "G" => 1 << 30,
        "T" => 1 << 40,
        "P" => 1 << 50,
        "E" => 1 << 60,
        _ => return Err(format!("invalid argument '{}'", s)),
    };

    value
        .checked_mul(factor)
        .and_then(|n| usize::try_from(n).ok())
        .ok_or_else(|| format!("argument '{}' out of range", s))
}
