//! Thin wrapper around `drivers::uart` so kernel code (fault printers, the
//! `ps`/shell formatters) doesn't take a direct dependency on register
//! layout. Mirrors the teacher's pattern of keeping peripheral register
//! access inside `drivers` and calling it by name from `kernel`/`firmware`.

#![allow(dead_code)]

/// # Safety
/// Must be called exactly once, from boot, before interrupts are enabled.
pub unsafe fn init(core_clock_hz: u32, baud: u32) {
    unsafe {
        drivers::uart::init(core_clock_hz, baud);
    }
}

pub fn write_str(s: &str) {
    drivers::uart::puts(s);
}

pub fn write_bytes(bytes: &[u8]) {
    drivers::uart::put_bytes(bytes);
}

pub fn kbhit() -> bool {
    drivers::uart::kbhit()
}

pub fn getc() -> u8 {
    drivers::uart::getc()
}
