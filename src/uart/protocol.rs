//! STM32 wire format
//!
//! frame: [SYNC][TYPE][LEN][PAYLOAD...][CHECKSUM]
//!        0xAA  1byte 1byte  LEN bytes   1byte
//!
//! The checksum is the wrapping byte sum of TYPE, LEN and PAYLOAD.

pub const SYNC_BYTE: u8 = 0xAA;
pub const MAX_MSG_SIZE: usize = 244;
//sync + type + len + checksum
const FRAME_OVERHEAD: usize = 4;

pub const THRUSTER_COUNT: usize = 8;
pub const THRUSTER_PWM_SIZE: usize = THRUSTER_COUNT * 2; //8 * u16

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum MsgType{
    Thruster = 0x03,
    Heartbeat = 0x04,
}

impl MsgType{
    pub fn from_u8(val: u8) -> Option<Self>{
        match val{
            0x03 => Some(MsgType::Thruster),
            0x04 => Some(MsgType::Heartbeat),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UartFrame{
    pub msg_type: MsgType,
    pub payload: Vec<u8>,
}

pub fn checksum(data: &[u8]) -> u8{
    data.iter().fold(0u8, |acc, &b| acc.wrapping_add(b))
}

/// Frame `payload`; None when it does not fit in one frame
pub fn encode_frame(msg_type: MsgType, payload: &[u8]) -> Option<Vec<u8>>{
    if payload.len() > MAX_MSG_SIZE{
        return None;
    }

    let mut frame = Vec::with_capacity(FRAME_OVERHEAD + payload.len());
    frame.push(SYNC_BYTE);
    frame.push(msg_type as u8);
    frame.push(payload.len() as u8);
    frame.extend_from_slice(payload);
    frame.push(checksum(&frame[1..]));
    Some(frame)
}

/// Incremental frame parser over a byte stream
#[derive(Debug, Default)]
pub struct FrameDecoder{
    rx_buffer: Vec<u8>,
}

impl FrameDecoder{
    pub fn new() -> Self{
        Self{ rx_buffer: Vec::with_capacity(512) }
    }

    pub fn extend(&mut self, bytes: &[u8]){
        self.rx_buffer.extend_from_slice(bytes);
    }

    /// Next complete frame. Garbage and corrupt frames are skipped one byte
    /// at a time until a valid sync is found.
    pub fn next_frame(&mut self) -> Option<UartFrame>{
        loop{
            let sync_pos = match self.rx_buffer.iter().position(|&b| b == SYNC_BYTE){
                Some(pos) => pos,
                None =>{
                    self.rx_buffer.clear();
                    return None;
                }
            };
            if sync_pos > 0{
                self.rx_buffer.drain(0..sync_pos);
            }

            if self.rx_buffer.len() < FRAME_OVERHEAD{
                return None;
            }

            let len = self.rx_buffer[2] as usize;
            if len > MAX_MSG_SIZE{
                self.rx_buffer.remove(0);
                continue;
            }

            let frame_len = FRAME_OVERHEAD + len;
            if self.rx_buffer.len() < frame_len{
                return None;
            }

            if self.rx_buffer[3 + len] != checksum(&self.rx_buffer[1..3 + len]){
                self.rx_buffer.remove(0);
                continue;
            }

            let frame = MsgType::from_u8(self.rx_buffer[1]).map(|msg_type| UartFrame{
                msg_type,
                payload: self.rx_buffer[3..3 + len].to_vec(),
            });
            self.rx_buffer.drain(0..frame_len);

            //well-formed frame of an unknown type, drop it and keep going
            if let Some(frame) = frame{
                return Some(frame);
            }
        }
    }
}

/// PWM command for all 8 thrusters, microseconds, little-endian on the wire
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct ThrusterPwmCmd{
    pub pwm: [u16; THRUSTER_COUNT],
}

impl ThrusterPwmCmd{
    pub fn new(pwm_values: [u16; THRUSTER_COUNT]) -> Self{
        ThrusterPwmCmd{ pwm: pwm_values }
    }

    pub fn from_bytes(data: &[u8]) -> Option<Self>{
        if data.len() < THRUSTER_PWM_SIZE{
            return None;
        }
        let mut pwm = [0u16; THRUSTER_COUNT];
        for (value, chunk) in pwm.iter_mut().zip(data.chunks_exact(2)){
            *value = u16::from_le_bytes([chunk[0], chunk[1]]);
        }
        Some(ThrusterPwmCmd{ pwm })
    }

    pub fn to_bytes(&self) -> Vec<u8>{
        self.pwm.iter().flat_map(|v| v.to_le_bytes()).collect()
    }
}

#[cfg(test)]
mod tests{
    use super::*;

    #[test]
    fn test_msg_type_conversion(){
        assert_eq!(MsgType::from_u8(0x03), Some(MsgType::Thruster));
        assert_eq!(MsgType::from_u8(0x04), Some(MsgType::Heartbeat));
        assert_eq!(MsgType::from_u8(0xFF), None);
    }

    #[test]
    fn test_thruster_pwm_cmd_layout(){
        let cmd = ThrusterPwmCmd::new([1500, 1600, 1400, 1550, 1450, 1500, 1100, 1900]);
        let bytes = cmd.to_bytes();
        assert_eq!(bytes.len(), 16);
        //1500 = 0x05DC
        assert_eq!(&bytes[0..2], &[0xDC, 0x05]);

        let decoded = ThrusterPwmCmd::from_bytes(&bytes).unwrap();
        assert_eq!(decoded, cmd);
        assert!(ThrusterPwmCmd::from_bytes(&bytes[..15]).is_none());
    }

    #[test]
    fn test_frame_checksum(){
        let frame = encode_frame(MsgType::Heartbeat, &[0xAB, 0xCD]).unwrap();
        assert_eq!(frame[..3], [SYNC_BYTE, 0x04, 2]);
        assert_eq!(frame[5], 0x04u8.wrapping_add(2).wrapping_add(0xAB).wrapping_add(0xCD));
        assert!(encode_frame(MsgType::Thruster, &[0u8; MAX_MSG_SIZE + 1]).is_none());
    }

    #[test]
    fn test_decoder_resyncs_after_garbage(){
        let good = encode_frame(MsgType::Thruster, &ThrusterPwmCmd::new([1500; 8]).to_bytes()).unwrap();
        let mut corrupt = good.clone();
        corrupt[5] ^= 0xFF;

        let mut decoder = FrameDecoder::new();
        decoder.extend(&[0x00, 0x13]);
        decoder.extend(&corrupt);
        decoder.extend(&good[..7]);
        assert_eq!(decoder.next_frame(), None);

        decoder.extend(&good[7..]);
        let frame = decoder.next_frame().unwrap();
        assert_eq!(frame.msg_type, MsgType::Thruster);
        assert_eq!(ThrusterPwmCmd::from_bytes(&frame.payload).unwrap().pwm, [1500; 8]);
        assert_eq!(decoder.next_frame(), None);
    }

    #[test]
    fn test_decoder_skips_unknown_types(){
        let mut unknown = vec![SYNC_BYTE, 0x7F, 1, 0x01];
        unknown.push(checksum(&unknown[1..]));
        let heartbeat = encode_frame(MsgType::Heartbeat, &[]).unwrap();

        let mut decoder = FrameDecoder::new();
        decoder.extend(&unknown);
        decoder.extend(&heartbeat);
        assert_eq!(decoder.next_frame().map(|f| f.msg_type), Some(MsgType::Heartbeat));
    }
}
