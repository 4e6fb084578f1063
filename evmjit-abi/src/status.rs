#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[repr(i32)]
pub enum ReturnCode {
    Stop = 0,
    Return = 1,
    Suicide = 2,
    BadJumpDestination = 101,
    OutOfGas = 102,
    StackTooSmall = 103,
    BadInstruction = 104,
    StackOverflow = 105,
}

impl ReturnCode {
    pub const ALL: [ReturnCode; 8] = [
        ReturnCode::Stop,
        ReturnCode::Return,
        ReturnCode::Suicide,
        ReturnCode::BadJumpDestination,
        ReturnCode::OutOfGas,
        ReturnCode::StackTooSmall,
        ReturnCode::BadInstruction,
        ReturnCode::StackOverflow,
    ];

    pub const fn code(self) -> i32 {
        self as i32
    }

    pub const fn from_i32(code: i32) -> Option<Self> {
        match code {
            0 => Some(ReturnCode::Stop),
            1 => Some(ReturnCode::Return),
            2 => Some(ReturnCode::Suicide),
            101 => Some(ReturnCode::BadJumpDestination),
            102 => Some(ReturnCode::OutOfGas),
            103 => Some(ReturnCode::StackTooSmall),
            104 => Some(ReturnCode::BadInstruction),
            105 => Some(ReturnCode::StackOverflow),
            _ => None,
        }
    }

    pub const fn is_success(self) -> bool {
        (self as i32) < 100
    }

    pub const fn name(self) -> &'static str {
        match self {
            ReturnCode::Stop => "stop",
            ReturnCode::Return => "return",
            ReturnCode::Suicide => "suicide",
            ReturnCode::BadJumpDestination => "bad-jump-destination",
            ReturnCode::OutOfGas => "out-of-gas",
            ReturnCode::StackTooSmall => "stack-too-small",
            ReturnCode::BadInstruction => "bad-instruction",
            ReturnCode::StackOverflow => "stack-overflow",
        }
    }
}

impl std::fmt::Display for ReturnCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} ({})", self.name(), self.code())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn codes_round_trip_through_i32() {
        for code in ReturnCode::ALL {
            assert_eq!(ReturnCode::from_i32(code.code()), Some(code));
        }
        assert_eq!(ReturnCode::from_i32(-1), None);
        assert_eq!(ReturnCode::from_i32(100), None);
    }

    #[test]
    fn only_stop_return_and_suicide_succeed() {
        let succeeding: Vec<_> = ReturnCode::ALL
            .into_iter()
            .filter(|code| code.is_success())
            .collect();
        assert_eq!(
            succeeding,
            [ReturnCode::Stop, ReturnCode::Return, ReturnCode::Suicide]
        );
    }
}
