//! Board drivers, one module per Click board.
//!
//! Drivers are generic over the [`hw_trait`](crate::hw_trait) traits and
//! take ownership of their bus and pin handles. Construction never touches
//! the hardware; boards with a power-up sequence provide `default_cfg()`.

pub mod adc;
pub mod amp_2x20w;
pub mod buzz;
pub mod clock_gen3;
pub mod dac;
pub mod dc_motor;
pub mod expand;
pub mod fram;
pub mod fram2;
pub mod fram5;
pub mod lte4g;
pub mod nbiot;
pub mod relay;
pub mod rtc2;
pub mod serializer;
pub mod thermo3;
pub mod turbidity;
pub mod uart_1wire;
