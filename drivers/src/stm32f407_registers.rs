
//declaring the registers

//RCC register
pub const RCC_BASE: u32 =    0x4002_3800;


//system config register
pub const SYSCFG_BASE: u32 =  0x4001_3800;

//GPIO Registers
pub const GPIO_A_BASE: u32 = 0x4002_0000;
pub const GPIO_B_BASE: u32 = 0x4002_0400;
pub const GPIO_C_BASE: u32 = 0x4002_0800;
pub const GPIO_D_BASE: u32 = 0x4002_0C00;
pub const GPIO_E_BASE: u32 = 0x4002_1000;
pub const GPIO_F_BASE: u32 = 0x4002_1400;
pub const GPIO_G_BASE: u32 = 0x4002_1800;
pub const GPIO_H_BASE: u32 = 0x4002_1C00;
pub const GPIO_I_BASE: u32 = 0x4002_2000;


//exti register
pub const EXTI_BASE : u32 = 0x4001_3C00;

//NVIC:
pub const NVIC_BASE : u32 = 0xE000_E100;
pub const NVIC_ISER: u32 = NVIC_BASE;
pub const NVIC_ICER: u32 = NVIC_BASE+ 0x80;
pub const NVIC_IPR: u32 = 0xE000_E400;


//SCB
pub const SCB_AIRCR_BASE: u32 = 0xE000_ED0C;

//Systic
pub const SYSTICK_BASE : u32 = 0xE000_E010;

//System Handler Priority registers (exception priorities for PendSV/SysTick/SVCall)
pub const NVIC_SHPR2: u32 = 0xE000_ED1C;
pub const NVIC_SHPR3: u32 = 0xE000_ED20;

//System Handler Control and State register (fault-pending bits)
pub const SCB_SHCSR: u32 = 0xE000_ED24;
pub const SHCSR_MEMFAULTENA: u32 = 1 << 16;
pub const SHCSR_BUSFAULTENA: u32 = 1 << 17;
pub const SHCSR_USGFAULTENA: u32 = 1 << 18;
pub const SHCSR_MEMFAULTPENDED: u32 = 1 << 13;
pub const SHCSR_BUSFAULTPENDED: u32 = 1 << 14;
pub const SHCSR_USGFAULTPENDED: u32 = 1 << 12;

//Configurable Fault Status Register and MemManage Fault Address Register
pub const SCB_CFSR: u32 = 0xE000_ED28;
pub const SCB_MMFAR: u32 = 0xE000_ED34;
pub const SCB_BFAR: u32 = 0xE000_ED38;

//FPU Coprocessor Access Control Register and Floating-Point Context Control Register
pub const SCB_CPACR: u32 = 0xE000_ED88;
pub const FPU_FPCCR: u32 = 0xE000_EF34;

//MPU registers (ARMv7-M MPU, present on Cortex-M4 parts with an MPU option)
pub const MPU_TYPE: u32 = 0xE000_ED90;
pub const MPU_CTRL: u32 = 0xE000_ED94;
pub const MPU_RNR: u32 = 0xE000_ED98;
pub const MPU_RBAR: u32 = 0xE000_ED9C;
pub const MPU_RASR: u32 = 0xE000_EDA0;

pub const MPU_CTRL_ENABLE: u32 = 1 << 0;
pub const MPU_CTRL_PRIVDEFENA: u32 = 1 << 2;

//USART2 (console UART; TX=PA2, RX=PA3 on the Discovery-style STM32F407 boards)
pub const USART2_BASE: u32 = 0x4000_4400;
pub const USART_SR_OFFSET: u32 = 0x00;
pub const USART_DR_OFFSET: u32 = 0x04;
pub const USART_BRR_OFFSET: u32 = 0x08;
pub const USART_CR1_OFFSET: u32 = 0x0C;

pub const USART_SR_RXNE: u32 = 1 << 5;
pub const USART_SR_TXE: u32 = 1 << 7;
pub const USART_CR1_RE: u32 = 1 << 2;
pub const USART_CR1_TE: u32 = 1 << 3;
pub const USART_CR1_UE: u32 = 1 << 13;


