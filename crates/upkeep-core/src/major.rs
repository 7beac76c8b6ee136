/// Which kind of high-risk file differs between the installed copy and a
/// freshly unpacked one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum MajorChange {
    #[default]
    None,
    ServiceLogic,
    Localization,
}

impl MajorChange {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::None => "",
            Self::ServiceLogic => "service",
            Self::Localization => "language",
        }
    }

    pub fn parse(input: &str) -> Option<Self> {
        match input.trim() {
            "" => Some(Self::None),
            "service" => Some(Self::ServiceLogic),
            "language" => Some(Self::Localization),
            _ => None,
        }
    }

    pub fn is_major(self) -> bool {
        self != Self::None
    }
}
