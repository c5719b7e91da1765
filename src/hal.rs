//! Board glue that is independent of the chip HAL.

use embedded_hal::digital::InputPin;

/// Number of address-select inputs.
pub const ADDRESS_PINS: usize = 4;

/// Board address from the select inputs, `pins[0]` being the least
/// significant bit. The inputs are pulled up, so a grounded pin reads as 1.
pub fn board_id<P: InputPin>(pins: &mut [P; ADDRESS_PINS]) -> Result<u8, P::Error> {
    let mut id = 0;
    for (bit, pin) in pins.iter_mut().enumerate() {
        if pin.is_low()? {
            id |= 1 << bit;
        }
    }
    Ok(id)
}
