//! USART2 console driver.
//!
//! Grounded on `original_source/.../shell.c`'s `putsUart0`/`getcUart0`/
//! `kbhitUart0` calls (the bodies live in a separate `uart0.c` not present
//! in this tree) and this crate's own `gpio.rs`/`read_write.rs` idiom for
//! register access. USART2 is used rather than USART0/1 because its pins
//! (PA2/PA3) are the ones broken out on the STM32F407 Discovery-style
//! boards this kernel targets.

#![allow(dead_code)]

use crate::read_write::{read_register, reg_write_bit, write_register};
use crate::stm32f407_registers::{
    RCC_BASE, USART2_BASE, USART_BRR_OFFSET, USART_CR1_OFFSET, USART_CR1_RE, USART_CR1_TE,
    USART_CR1_UE, USART_DR_OFFSET, USART_SR_OFFSET, USART_SR_RXNE, USART_SR_TXE,
};

const RCC_APB1ENR: u32 = RCC_BASE + 0x40;
const RCC_AHB1ENR: u32 = RCC_BASE + 0x30;
const USART2_EN_BIT: u32 = 17;
const GPIOA_EN_BIT: u32 = 0;

fn reg(offset: u32) -> *mut u32 {
    (USART2_BASE + offset) as *mut u32
}

/// Enables the peripheral clocks, configures PA2/PA3 for alternate
/// function (AF7, USART2), and programs the baud rate for `core_clock_hz`.
///
/// # Safety
/// Must run once at boot, before any other task touches the console.
pub unsafe fn init(core_clock_hz: u32, baud: u32) {
    unsafe {
        reg_write_bit(RCC_AHB1ENR as *mut u32, GPIOA_EN_BIT, true);
        reg_write_bit(RCC_APB1ENR as *mut u32, USART2_EN_BIT, true);

        crate::gpio::gpio_configure_mode(0, 2, 2); // PA2 -> alternate function
        crate::gpio::gpio_configure_mode(0, 3, 2); // PA3 -> alternate function

        let brr = core_clock_hz / baud;
        write_register(reg(USART_BRR_OFFSET), brr);

        write_register(reg(USART_CR1_OFFSET), USART_CR1_UE | USART_CR1_TE | USART_CR1_RE);
    }
}

/// Blocks until the transmit data register is empty, then writes one byte.
pub fn putc(byte: u8) {
    unsafe {
        while read_register(reg(USART_SR_OFFSET)) & USART_SR_TXE == 0 {}
        write_register(reg(USART_DR_OFFSET), byte as u32);
    }
}

pub fn puts(s: &str) {
    for b in s.as_bytes() {
        putc(*b);
    }
}

pub fn put_bytes(bytes: &[u8]) {
    for b in bytes {
        putc(*b);
    }
}

/// True if a received byte is waiting in the data register.
pub fn kbhit() -> bool {
    unsafe { read_register(reg(USART_SR_OFFSET)) & USART_SR_RXNE != 0 }
}

/// Blocks until a byte is available, then returns it.
pub fn getc() -> u8 {
    unsafe {
        while read_register(reg(USART_SR_OFFSET)) & USART_SR_RXNE == 0 {}
        read_register(reg(USART_DR_OFFSET)) as u8
    }
}
