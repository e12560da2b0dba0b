//! SX126x LoRa modem driver.
//!
//! Implements the raw command protocol over a [`CommandPort`]: every
//! command is bracketed by BUSY waits and chip select, and the status
//! byte clocked back during the data phase is checked for the error
//! sub-field. Failed commands are retried a bounded number of times;
//! a command that keeps failing is logged and dropped, the chip ends
//! up reconfigured on the next mode change.

use log::{error, info, warn};

use crate::lora::port::CommandPort;
use crate::lora::retry::retry_with_timeout;

/// Upper bound on one BUSY wait.
pub const BUSY_TIMEOUT_MS: u32 = 5000;
const BUSY_POLL_STEP_MS: u32 = 1;
/// Commands with a bad status byte are retried this many times.
pub const CMD_RETRIES: u32 = 10;

/// TX power in dBm for levels 0..=6 of this module's PA.
pub const POWER_TABLE: [i8; 7] = [-5, -2, 1, 4, 7, 10, 13];

/// PLL step: 32 MHz crystal over a 2^25 divider.
pub const FREQ_STEP: f64 = 32_000_000.0 / ((1u64 << 25) as f64);

pub mod opcode {
    pub const SET_STANDBY: u8 = 0x80;
    pub const SET_RX: u8 = 0x82;
    pub const SET_TX: u8 = 0x83;
    pub const SET_RF_FREQUENCY: u8 = 0x86;
    pub const CALIBRATE: u8 = 0x89;
    pub const SET_PACKET_TYPE: u8 = 0x8A;
    pub const SET_MODULATION_PARAMS: u8 = 0x8B;
    pub const SET_PACKET_PARAMS: u8 = 0x8C;
    pub const SET_TX_PARAMS: u8 = 0x8E;
    pub const SET_BUFFER_BASE_ADDRESS: u8 = 0x8F;
    pub const SET_PA_CONFIG: u8 = 0x95;
    pub const SET_REGULATOR_MODE: u8 = 0x96;
    pub const CALIBRATE_IMAGE: u8 = 0x98;
    pub const SET_DIO2_AS_RF_SWITCH: u8 = 0x9D;
    pub const STOP_TIMER_ON_PREAMBLE: u8 = 0x9F;
    pub const SET_LORA_SYMB_NUM_TIMEOUT: u8 = 0xA0;
    pub const SET_DIO_IRQ_PARAMS: u8 = 0x08;
    pub const CLEAR_IRQ_STATUS: u8 = 0x02;
    pub const GET_IRQ_STATUS: u8 = 0x12;
    pub const GET_RX_BUFFER_STATUS: u8 = 0x13;
    pub const GET_PACKET_STATUS: u8 = 0x14;
    pub const GET_RSSI_INST: u8 = 0x15;
    pub const READ_BUFFER: u8 = 0x1E;
    pub const WRITE_BUFFER: u8 = 0x0E;
    pub const READ_REGISTER: u8 = 0x1D;
    pub const WRITE_REGISTER: u8 = 0x0D;
    pub const GET_STATUS: u8 = 0xC0;
    pub const NOP: u8 = 0x00;
}

mod reg {
    pub const LORA_SYNC_WORD_MSB: u16 = 0x0740;
    pub const IQ_POLARITY_SETUP: u16 = 0x0736;
    pub const OCP_CONFIGURATION: u16 = 0x08E7;
}

/// Status byte command-status sub-field (bits 3:1).
pub mod status {
    pub const MASK: u8 = 0b0000_1110;
    pub const CMD_TIMEOUT: u8 = 0x06;
    pub const CMD_INVALID: u8 = 0x08;
    pub const CMD_FAILED: u8 = 0x0A;
    /// Synthetic code for an all-zero or all-one SPI read.
    pub const SPI_FAILED: u8 = 0xFF;
}

pub mod irq {
    pub const TX_DONE: u16 = 0x0001;
    pub const RX_DONE: u16 = 0x0002;
    pub const PREAMBLE_DETECTED: u16 = 0x0004;
    pub const SYNC_WORD_VALID: u16 = 0x0008;
    pub const HEADER_VALID: u16 = 0x0010;
    pub const HEADER_ERR: u16 = 0x0020;
    pub const CRC_ERR: u16 = 0x0040;
    pub const CAD_DONE: u16 = 0x0080;
    pub const CAD_DETECTED: u16 = 0x0100;
    pub const TIMEOUT: u16 = 0x0200;
    pub const ALL: u16 = 0x03FF;
    pub const NONE: u16 = 0x0000;
}

const STANDBY_RC: u8 = 0x00;
const PACKET_TYPE_LORA: u8 = 0x01;
const REGULATOR_DC_DC: u8 = 0x01;
const REGULATOR_LDO: u8 = 0x00;
const PA_RAMP_200U: u8 = 0x04;
const CRC_ON: u8 = 0x01;
const CRC_OFF: u8 = 0x00;

const SYNC_WORD_PUBLIC: u16 = 0x3444;
const SYNC_WORD_PRIVATE: u16 = 0x1424;

const CALIBRATE_ALL: u8 = 0x7F;

/// LoRa bandwidth register value for 125 kHz.
pub const LORA_BW_125: u8 = 0x04;

/// Continuous receive, no timeout.
pub const RX_CONTINUOUS: u32 = 0xFFFFFF;

/// 15.625 us Tx timeout steps per millisecond.
const TX_TIMEOUT_STEPS_PER_MS: u32 = 64;

#[derive(Debug)]
pub enum DriverError {
    /// Sync word probe failed, most likely no SPI connection.
    NotDetected { sync_word: u16 },
}

impl std::fmt::Display for DriverError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::NotDetected { sync_word } => {
                write!(f, "SX126x not detected (sync word 0x{sync_word:04x})")
            }
        }
    }
}

impl std::error::Error for DriverError {}

/// Block until the BUSY pin drops. Logs and gives up after
/// [`BUSY_TIMEOUT_MS`]; the caller proceeds regardless, the command
/// status check catches the fallout.
fn wait_idle<P: CommandPort>(port: &mut P, ctx: &str) -> bool {
    let r = retry_with_timeout(
        port,
        u32::MAX,
        BUSY_TIMEOUT_MS,
        BUSY_POLL_STEP_MS,
        |p| !p.busy(),
        |p, ms| p.delay_ms(ms),
    );
    if !r.is_done() {
        error!("BUSY wait timed out ({ctx})");
        return false;
    }
    true
}

/// One write command transaction. Returns 0 on success or the error
/// sub-field of the first bad status byte clocked back.
fn write_command_once<P: CommandPort>(port: &mut P, op: u8, data: &[u8]) -> u8 {
    wait_idle(port, "write command");
    port.select(true);
    port.transfer(op);
    let mut result = 0u8;
    for &b in data {
        let in_byte = port.transfer(b);
        let sub = in_byte & status::MASK;
        if sub == status::CMD_TIMEOUT || sub == status::CMD_INVALID || sub == status::CMD_FAILED {
            result = sub;
            break;
        } else if in_byte == 0x00 || in_byte == 0xFF {
            result = status::SPI_FAILED;
            break;
        }
    }
    port.select(false);
    wait_idle(port, "write command end");
    result
}

fn read_command<P: CommandPort>(port: &mut P, op: u8, out: &mut [u8]) {
    wait_idle(port, "read command");
    port.select(true);
    port.transfer(op);
    for b in out.iter_mut() {
        *b = port.transfer(opcode::NOP);
    }
    port.select(false);
    port.delay_ms(1);
    wait_idle(port, "read command end");
}

fn read_register<P: CommandPort>(port: &mut P, reg: u16, out: &mut [u8]) {
    wait_idle(port, "read register");
    port.select(true);
    port.transfer(opcode::READ_REGISTER);
    port.transfer((reg >> 8) as u8);
    port.transfer(reg as u8);
    port.transfer(opcode::NOP);
    for b in out.iter_mut() {
        *b = port.transfer(opcode::NOP);
    }
    port.select(false);
    wait_idle(port, "read register end");
}

fn write_register<P: CommandPort>(port: &mut P, reg: u16, data: &[u8]) {
    wait_idle(port, "write register");
    port.select(true);
    port.transfer(opcode::WRITE_REGISTER);
    port.transfer((reg >> 8) as u8);
    port.transfer(reg as u8);
    for &b in data {
        port.transfer(b);
    }
    port.select(false);
    wait_idle(port, "write register end");
}

/// SX126x modem behind a [`CommandPort`].
pub struct Sx126x<P> {
    port: P,
    packet_params: [u8; 6],
}

impl<P: CommandPort> Sx126x<P> {
    pub fn new(port: P) -> Self {
        Self {
            port,
            packet_params: [0; 6],
        }
    }

    pub fn port_mut(&mut self) -> &mut P {
        &mut self.port
    }

    /// Write command with retry. A bad status byte is retried up to
    /// [`CMD_RETRIES`] times; persistent failure is logged and the
    /// command dropped.
    fn write_command(&mut self, op: u8, data: &[u8]) {
        let r = retry_with_timeout(
            &mut self.port,
            CMD_RETRIES,
            u32::MAX,
            0,
            |p| {
                let st = write_command_once(p, op, data);
                if st != 0 {
                    warn!("command 0x{op:02x} status 0x{st:02x}");
                }
                st == 0
            },
            |_, _| {},
        );
        if !r.is_done() {
            error!("SPI transaction failed for command 0x{op:02x}");
        }
    }

    /// Reset the chip, probe the sync word and load the base
    /// configuration. `power_dbm` is clamped to the PA range.
    pub fn begin(
        &mut self,
        frequency_hz: u32,
        power_dbm: i8,
        use_ldo: bool,
    ) -> Result<(), DriverError> {
        let power_dbm = power_dbm.clamp(-3, 22);
        self.reset();

        let mut wk = [0u8; 2];
        read_register(&mut self.port, reg::LORA_SYNC_WORD_MSB, &mut wk);
        let sync_word = ((wk[0] as u16) << 8) | wk[1] as u16;
        info!("sync word = 0x{sync_word:04x}");
        if sync_word != SYNC_WORD_PUBLIC && sync_word != SYNC_WORD_PRIVATE {
            error!("SX126x error, maybe no SPI connection");
            return Err(DriverError::NotDetected { sync_word });
        }

        self.set_standby(STANDBY_RC);
        self.write_command(opcode::SET_DIO2_AS_RF_SWITCH, &[1]);
        self.write_command(opcode::CALIBRATE, &[CALIBRATE_ALL]);
        let regulator = if use_ldo { REGULATOR_LDO } else { REGULATOR_DC_DC };
        self.write_command(opcode::SET_REGULATOR_MODE, &[regulator]);

        // PA optimal settings for +14 dBm
        self.write_command(opcode::SET_PA_CONFIG, &[0x04, 0x06, 0x00, 0x01]);
        self.set_overcurrent_protection(60.0);
        self.set_power_config(power_dbm, PA_RAMP_200U);
        self.set_rf_frequency(frequency_hz);
        Ok(())
    }

    /// LoRa mode setup: modulation, packet framing, interrupts, then
    /// continuous receive.
    #[allow(clippy::too_many_arguments)]
    pub fn configure(
        &mut self,
        spreading_factor: u8,
        bandwidth: u8,
        coding_rate: u8,
        preamble_len: u16,
        payload_len: u8,
        crc_on: bool,
        invert_iq: bool,
        ldro: u8,
    ) {
        self.write_command(opcode::STOP_TIMER_ON_PREAMBLE, &[0]);
        self.write_command(opcode::SET_LORA_SYMB_NUM_TIMEOUT, &[0]);
        self.write_command(opcode::SET_PACKET_TYPE, &[PACKET_TYPE_LORA]);
        self.set_modulation_params(spreading_factor, bandwidth, coding_rate, ldro);

        self.packet_params[0] = (preamble_len >> 8) as u8;
        self.packet_params[1] = preamble_len as u8;
        if payload_len > 0 {
            // Fixed length packet (implicit header)
            self.packet_params[2] = 0x01;
            self.packet_params[3] = payload_len;
        } else {
            // Variable length packet (explicit header)
            self.packet_params[2] = 0x00;
            self.packet_params[3] = 0xFF;
        }
        self.packet_params[4] = if crc_on { CRC_ON } else { CRC_OFF };
        self.packet_params[5] = if invert_iq { 0x01 } else { 0x00 };

        self.fix_inverted_iq(self.packet_params[5]);
        let params = self.packet_params;
        self.write_command(opcode::SET_PACKET_PARAMS, &params);

        self.set_dio_irq_params(irq::ALL, irq::NONE, irq::NONE, irq::NONE);
        self.set_rx(RX_CONTINUOUS);
    }

    /// Route interrupts in `mask` to the DIO1 pin.
    pub fn enable_irq(&mut self, mask: u16) {
        self.set_dio_irq_params(irq::ALL, mask, irq::NONE, irq::NONE);
    }

    pub fn set_modulation_params(
        &mut self,
        spreading_factor: u8,
        bandwidth: u8,
        coding_rate: u8,
        ldro: u8,
    ) {
        let mut cr = coding_rate;
        if cr > 8 {
            error!("LoRa CR setting out of range: {cr}");
            cr = 1;
        }
        let mut sf = spreading_factor;
        if !(8..=12).contains(&sf) {
            error!("LoRa SF setting out of range: {sf}");
            sf = 12;
        }
        self.write_command(opcode::SET_MODULATION_PARAMS, &[sf, bandwidth, cr, ldro]);
    }

    pub fn set_rf_frequency(&mut self, frequency_hz: u32) {
        // Image rejection for the 433 MHz band
        self.write_command(opcode::CALIBRATE_IMAGE, &[0x6B, 0x6F]);

        let steps = (frequency_hz as f64 / FREQ_STEP) as u32;
        self.write_command(opcode::SET_RF_FREQUENCY, &steps.to_be_bytes());
    }

    /// Set TX power from the module's level table (0..=6).
    pub fn set_tx_power(&mut self, level: u8) {
        let level = level.min(POWER_TABLE.len() as u8 - 1);
        self.set_power_config(POWER_TABLE[level as usize], PA_RAMP_200U);
    }

    fn set_power_config(&mut self, power_dbm: i8, ramp_time: u8) {
        let power = power_dbm.clamp(-5, 22);
        self.write_command(opcode::SET_TX_PARAMS, &[power as u8, ramp_time]);
    }

    fn set_overcurrent_protection(&mut self, limit_ma: f64) {
        if (0.0..=140.0).contains(&limit_ma) {
            write_register(
                &mut self.port,
                reg::OCP_CONFIGURATION,
                &[(limit_ma / 2.5) as u8],
            );
        }
    }

    /// IQ polarity errata: bit 2 at 0x0736 must be cleared for
    /// inverted IQ and set for standard IQ.
    fn fix_inverted_iq(&mut self, iq_config: u8) {
        let mut current = [0u8];
        read_register(&mut self.port, reg::IQ_POLARITY_SETUP, &mut current);
        if iq_config == 0x01 {
            current[0] &= 0xFB;
        } else {
            current[0] |= 0x04;
        }
        write_register(&mut self.port, reg::IQ_POLARITY_SETUP, &current);
    }

    fn set_standby(&mut self, mode: u8) {
        self.write_command(opcode::SET_STANDBY, &[mode]);
    }

    fn set_dio_irq_params(&mut self, irq_mask: u16, dio1: u16, dio2: u16, dio3: u16) {
        let buf = [
            (irq_mask >> 8) as u8,
            irq_mask as u8,
            (dio1 >> 8) as u8,
            dio1 as u8,
            (dio2 >> 8) as u8,
            dio2 as u8,
            (dio3 >> 8) as u8,
            dio3 as u8,
        ];
        self.write_command(opcode::SET_DIO_IRQ_PARAMS, &buf);
    }

    /// Enter RX mode. `timeout` is in 15.625 us steps,
    /// [`RX_CONTINUOUS`] for no timeout. The chip status is polled
    /// until it reports RX.
    pub fn set_rx(&mut self, timeout: u32) {
        self.set_standby(STANDBY_RC);
        let buf = [(timeout >> 16) as u8, (timeout >> 8) as u8, timeout as u8];
        self.write_command(opcode::SET_RX, &buf);

        let r = retry_with_timeout(
            &mut self.port,
            10,
            u32::MAX,
            1,
            |p| {
                let mut st = [0u8];
                read_command(p, opcode::GET_STATUS, &mut st);
                st[0] & 0x70 == 0x50
            },
            |p, ms| p.delay_ms(ms),
        );
        if !r.is_done() {
            error!("SetRx illegal status");
        }
    }

    /// Enter TX mode with a timeout in milliseconds (0 disables it).
    pub fn set_tx(&mut self, timeout_ms: u32) {
        self.set_standby(STANDBY_RC);
        let tout = timeout_ms * TX_TIMEOUT_STEPS_PER_MS;
        let buf = [(tout >> 16) as u8, (tout >> 8) as u8, tout as u8];
        self.write_command(opcode::SET_TX, &buf);

        let r = retry_with_timeout(
            &mut self.port,
            10,
            u32::MAX,
            1,
            |p| {
                let mut st = [0u8];
                read_command(p, opcode::GET_STATUS, &mut st);
                st[0] & 0x70 == 0x60
            },
            |p, ms| p.delay_ms(ms),
        );
        if !r.is_done() {
            error!("SetTx illegal status");
        }
    }

    pub fn get_status(&mut self) -> u8 {
        let mut st = [0u8];
        read_command(&mut self.port, opcode::GET_STATUS, &mut st);
        st[0]
    }

    /// Queue a packet and key the transmitter.
    pub fn send(&mut self, data: &[u8]) {
        // Back to variable length with this payload size
        self.packet_params[2] = 0x00;
        self.packet_params[3] = data.len() as u8;
        let params = self.packet_params;
        self.write_command(opcode::SET_PACKET_PARAMS, &params);
        self.clear_irq();
        self.write_buffer(data);
        self.port.set_pa_enable(true);
        self.set_tx(500);
    }

    /// Drop out of TX and back to continuous receive.
    pub fn tx_off(&mut self) {
        self.set_rx(RX_CONTINUOUS);
        self.port.set_pa_enable(false);
    }

    /// Pull a received packet if one is pending. Returns the payload
    /// length, 0 when nothing (or nothing intact) was received.
    pub fn receive(&mut self, buf: &mut [u8]) -> usize {
        let irq_regs = self.get_irq_status();
        if irq_regs & irq::RX_DONE != 0 {
            if irq_regs & (irq::CRC_ERR | irq::HEADER_ERR) != 0 {
                info!("CRC error");
                return 0;
            }
            return self.read_buffer(buf);
        }
        0
    }

    pub fn get_irq_status(&mut self) -> u16 {
        let mut data = [0u8; 3];
        read_command(&mut self.port, opcode::GET_IRQ_STATUS, &mut data);
        ((data[1] as u16) << 8) | data[2] as u16
    }

    pub fn clear_irq(&mut self) {
        let buf = [(irq::ALL >> 8) as u8, irq::ALL as u8];
        self.write_command(opcode::CLEAR_IRQ_STATUS, &buf);
    }

    /// Raw instantaneous RSSI; dBm is -raw/2.
    pub fn get_rssi_inst(&mut self) -> u8 {
        let mut buf = [0u8; 2];
        read_command(&mut self.port, opcode::GET_RSSI_INST, &mut buf);
        buf[1]
    }

    pub fn rssi_dbm(&mut self) -> i16 {
        -((self.get_rssi_inst() as i16) / 2)
    }

    /// RSSI and SNR of the last received packet, both in dB(m).
    pub fn get_packet_status(&mut self) -> (i8, i8) {
        let mut buf = [0u8; 4];
        read_command(&mut self.port, opcode::GET_PACKET_STATUS, &mut buf);
        let rssi = -((buf[3] >> 1) as i8);
        let snr = (buf[2] as i8) >> 2;
        (rssi, snr)
    }

    pub fn set_buffer_addr(&mut self, tx_base: u8, rx_base: u8) {
        self.write_command(opcode::SET_BUFFER_BASE_ADDRESS, &[tx_base, rx_base]);
    }

    fn get_rx_buffer_status(&mut self) -> (u8, u8) {
        let mut buf = [0u8; 3];
        read_command(&mut self.port, opcode::GET_RX_BUFFER_STATUS, &mut buf);
        (buf[1], buf[2])
    }

    fn read_buffer(&mut self, out: &mut [u8]) -> usize {
        let (payload_len, offset) = self.get_rx_buffer_status();
        let payload_len = payload_len as usize;
        if payload_len > out.len() {
            warn!(
                "read buffer too small: payload={payload_len} buf={}",
                out.len()
            );
            return 0;
        }
        wait_idle(&mut self.port, "read buffer");
        self.port.select(true);
        self.port.transfer(opcode::READ_BUFFER);
        self.port.transfer(offset);
        self.port.transfer(opcode::NOP);
        for b in out[..payload_len].iter_mut() {
            *b = self.port.transfer(opcode::NOP);
        }
        self.port.select(false);
        wait_idle(&mut self.port, "read buffer end");
        payload_len
    }

    fn write_buffer(&mut self, data: &[u8]) {
        wait_idle(&mut self.port, "write buffer");
        self.port.select(true);
        self.port.transfer(opcode::WRITE_BUFFER);
        self.port.transfer(0);
        for &b in data {
            self.port.transfer(b);
        }
        self.port.select(false);
        wait_idle(&mut self.port, "write buffer end");
    }

    fn reset(&mut self) {
        self.port.delay_ms(10);
        self.port.set_reset(false);
        self.port.delay_ms(20);
        self.port.set_reset(true);
        self.port.delay_ms(10);
        wait_idle(&mut self.port, "reset");
    }
}
