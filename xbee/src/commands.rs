use std::fmt::{self, Display};

macro_rules! define_at_commands {
    ($(($command:ident, $code:literal, $description:expr)),+ $(,)?) => {
        pub const AT_COMMANDS: &[AtCommand] = &[$(AtCommand::$command),+];

        /// Two-character AT command understood by the module.
        #[derive(Copy, Clone, Debug, PartialEq, Eq)]
        pub enum AtCommand {
            $($command,)+
            Other([u8; 2]),
        }

        impl AtCommand {
            pub fn code(&self) -> [u8; 2] {
                match self {
                    $(AtCommand::$command => *$code,)+
                    AtCommand::Other(code) => *code,
                }
            }

            pub fn description(&self) -> &'static str {
                match self {
                    $(AtCommand::$command => $description,)+
                    AtCommand::Other(_) => "unknown command",
                }
            }
        }

        impl From<[u8; 2]> for AtCommand {
            fn from(code: [u8; 2]) -> Self {
                match &code {
                    $($code => AtCommand::$command,)+
                    _ => AtCommand::Other(code),
                }
            }
        }
    };
}

define_at_commands! {
    (SerialNumberHigh, b"SH", "serial number, high 32 bits"),
    (SerialNumberLow, b"SL", "serial number, low 32 bits"),
    (NetworkAddress, b"MY", "16-bit network address"),
    (NodeIdentifier, b"NI", "node identifier string"),
    (FirmwareVersion, b"VR", "firmware version"),
    (HardwareVersion, b"HV", "hardware version"),
    (NodeDiscover, b"ND", "node discover"),
    (DiscoverTimeout, b"NT", "node discover timeout"),
    (AssociationIndication, b"AI", "association indication"),
    (NodeJoinTime, b"NJ", "node join time"),
    (ApiMode, b"AP", "API enable"),
}

impl Display for AtCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let code = self.code();
        write!(f, "{}", String::from_utf8_lossy(&code))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn known_codes_map_both_ways() {
        for command in AT_COMMANDS {
            assert_eq!(AtCommand::from(command.code()), *command);
        }
        assert_eq!(AtCommand::from(*b"ND"), AtCommand::NodeDiscover);
        assert_eq!(AtCommand::NodeJoinTime.code(), [0x4E, 0x4A]);
    }

    #[test]
    fn unknown_codes_are_kept() {
        let command = AtCommand::from(*b"ZZ");
        assert_eq!(command, AtCommand::Other(*b"ZZ"));
        assert_eq!(command.to_string(), "ZZ");
    }
}
