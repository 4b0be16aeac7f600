//! Interactive shell task: reads newline-terminated commands off the
//! console UART and turns them into kernel SVC requests.
//!
//! Grounded on `original_source/.../shell.c`'s command loop and its
//! field-splitting convention ("fields are separated by runs of
//! non-alphanumeric characters", SPEC_FULL §6); this module re-implements
//! that tokenizer against `&[u8]` rather than the original's C string
//! helpers (`kernel::fmt` takes over `c_fnc.c`'s role).

#![allow(dead_code)]

use kernel::console;
use kernel::fmt;
use kernel::svc::{self, PsRow};

const MAX_LINE: usize = 64;
const MAX_TOKENS: usize = 4;
const MAX_PS_ROWS: usize = 10;

fn is_alnum(b: u8) -> bool {
    b.is_ascii_alphanumeric()
}

fn eq_ci(a: &[u8], b: &[u8]) -> bool {
    a.len() == b.len() && a.iter().zip(b.iter()).all(|(x, y)| x.to_ascii_lowercase() == y.to_ascii_lowercase())
}

/// Splits `line` into up to `MAX_TOKENS` alphanumeric spans, skipping runs
/// of any other byte (space, `-`, `_`, punctuation...) exactly as SPEC_FULL
/// §6 specifies.
fn tokenize(line: &[u8]) -> ([(usize, usize); MAX_TOKENS], usize) {
    let mut spans = [(0usize, 0usize); MAX_TOKENS];
    let mut n = 0;
    let mut i = 0;
    while i < line.len() && n < MAX_TOKENS {
        while i < line.len() && !is_alnum(line[i]) {
            i += 1;
        }
        if i >= line.len() {
            break;
        }
        let start = i;
        while i < line.len() && is_alnum(line[i]) {
            i += 1;
        }
        spans[n] = (start, i);
        n += 1;
    }
    (spans, n)
}

fn state_name(state: u8) -> &'static str {
    match state {
        0 => "INVALID",
        1 => "STOPPED",
        2 => "READY",
        3 => "DELAYED",
        4 => "BLOCKED_MUTEX",
        5 => "BLOCKED_SEM",
        _ => "?",
    }
}

fn print_ps() {
    let mut rows = [PsRow::EMPTY; MAX_PS_ROWS];
    let n = svc::ps(&mut rows) as usize;
    console::write_str("\nPID      NAME             CPU%  STATE\n");
    let mut task_percent_x100: u32 = 0;
    for row in rows.iter().take(n) {
        if !row.valid {
            continue;
        }
        let mut hexbuf = [0u8; 8];
        let hex = fmt::u32_to_hex(row.pid, &mut hexbuf);
        console::write_bytes(hex);
        console::write_str("  ");
        let name_len = row.name.iter().position(|&b| b == 0).unwrap_or(row.name.len());
        console::write_bytes(&row.name[..name_len]);
        console::write_str("  ");
        let mut numbuf = [0u8; 10];
        let pct = fmt::num_to_str((row.cpu_percent_x100 / 100) as u32, &mut numbuf);
        console::write_bytes(pct);
        console::write_str("%  ");
        console::write_str(state_name(row.state));
        console::write_str("\n");
        task_percent_x100 += row.cpu_percent_x100 as u32;
    }
    // "kernel" time: whatever fraction of the accounting period wasn't
    // attributed to any task's ping-pong buffer (SPEC_FULL §4.4, PS row).
    let kernel_percent_x100 = 10_000u32.saturating_sub(task_percent_x100);
    let mut numbuf = [0u8; 10];
    let pct = fmt::num_to_str(kernel_percent_x100 / 100, &mut numbuf);
    console::write_str("kernel   ");
    console::write_bytes(pct);
    console::write_str("%\n");
}

fn dispatch(line: &[u8]) {
    let (spans, n) = tokenize(line);
    if n == 0 {
        return;
    }
    let cmd = &line[spans[0].0..spans[0].1];
    let arg1 = if n >= 2 { &line[spans[1].0..spans[1].1] } else { &line[0..0] };

    if eq_ci(cmd, b"reboot") {
        svc::reboot();
    } else if eq_ci(cmd, b"ps") {
        print_ps();
    } else if eq_ci(cmd, b"ipcs") {
        svc::ipcs();
    } else if eq_ci(cmd, b"meminfo") {
        svc::meminfo();
    } else if eq_ci(cmd, b"kill") {
        if n >= 2 {
            svc::kill(fmt::hex_to_u32(arg1));
        }
    } else if eq_ci(cmd, b"pkill") {
        if n >= 2 {
            svc::pkill(arg1.as_ptr(), arg1.len() as u32);
        }
    } else if eq_ci(cmd, b"pi") {
        if n >= 2 {
            svc::priority_inheritance(eq_ci(arg1, b"on"));
        }
    } else if eq_ci(cmd, b"preempt") {
        if n >= 2 {
            svc::preempt(eq_ci(arg1, b"on"));
        }
    } else if eq_ci(cmd, b"sched") {
        if n >= 2 {
            svc::sched_round_robin(eq_ci(arg1, b"rr"));
        }
    } else if eq_ci(cmd, b"pidof") {
        if n >= 2 {
            let pid = svc::pidof(arg1.as_ptr(), arg1.len() as u32);
            let mut hexbuf = [0u8; 8];
            let hex = fmt::u32_to_hex(pid.0, &mut hexbuf);
            console::write_str("\n");
            console::write_bytes(hex);
            console::write_str("\n");
        }
    } else {
        // A bare task name restarts it (SPEC_FULL §6).
        svc::restart_by_name(cmd.as_ptr(), cmd.len() as u32);
    }
}

pub extern "C" fn shell_task() {
    let mut line = [0u8; MAX_LINE];
    let mut len = 0usize;
    console::write_str("\n> ");
    loop {
        if console::kbhit() {
            let c = console::getc();
            match c {
                b'\r' | b'\n' => {
                    dispatch(&line[..len]);
                    len = 0;
                    console::write_str("\n> ");
                }
                0x08 | 0x7F => {
                    if len > 0 {
                        len -= 1;
                    }
                }
                _ => {
                    if len < MAX_LINE {
                        console::write_bytes(&[c]);
                        line[len] = c;
                        len += 1;
                    }
                }
            }
        } else {
            svc::yield_now();
        }
    }
}
