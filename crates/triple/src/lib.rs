use std::fmt::{Display, Formatter};

use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TargetTriple {
    pub architecture: Architecture,
    pub os: Os,
    pub abi: Abi,
}

impl TargetTriple {
    pub fn new(architecture: Architecture, os: Os, abi: Abi) -> Self {
        Self {
            architecture,
            os,
            abi,
        }
    }

    pub fn parse(s: &str) -> Result<Self, InvalidTriple<'_>> {
        let mut triple = s.split('-');

        let arch = Architecture::parse(triple.next().ok_or(InvalidTriple::InvalidFormat(s))?)?;
        let os = Os::parse(triple.next().ok_or(InvalidTriple::InvalidFormat(s))?)?;
        let abi = Abi::parse(triple.next().ok_or(InvalidTriple::InvalidFormat(s))?)?;

        if triple.next().is_some() {
            return Err(InvalidTriple::InvalidFormat(s));
        }

        match (os, abi) {
            (Os::Darwin, Abi::None) => {}
            (Os::Darwin, _) | (_, Abi::None) => return Err(InvalidTriple::InvalidCombination),
            _ => {}
        }

        Ok(Self::new(arch, os, abi))
    }

    /// Size in bytes of a guest machine word.
    pub fn word_size(&self) -> u32 {
        self.architecture.word_size()
    }
}

impl Display for TargetTriple {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}-{}-{}", self.architecture, self.os, self.abi)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Architecture {
    X86,
    Amd64,
    Arm64,
    Ppc64,
}

impl Architecture {
    fn parse(s: &str) -> Result<Self, InvalidTriple<'_>> {
        match s {
            "x86" => Ok(Self::X86),
            "amd64" => Ok(Self::Amd64),
            "arm64" => Ok(Self::Arm64),
            "ppc64" => Ok(Self::Ppc64),
            _ => Err(InvalidTriple::ArchitectureNotSupported),
        }
    }

    pub fn word_size(self) -> u32 {
        match self {
            Self::X86 => 4,
            Self::Amd64 | Self::Arm64 | Self::Ppc64 => 8,
        }
    }
}

impl Display for Architecture {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::X86 => write!(f, "x86"),
            Self::Amd64 => write!(f, "amd64"),
            Self::Arm64 => write!(f, "arm64"),
            Self::Ppc64 => write!(f, "ppc64"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Os {
    Linux,
    FreeBsd,
    Darwin,
}

impl Os {
    fn parse(s: &str) -> Result<Self, InvalidTriple<'_>> {
        match s {
            "linux" => Ok(Self::Linux),
            "freebsd" => Ok(Self::FreeBsd),
            "darwin" => Ok(Self::Darwin),
            _ => Err(InvalidTriple::OsNotSupported),
        }
    }
}

impl Display for Os {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Linux => write!(f, "linux"),
            Self::FreeBsd => write!(f, "freebsd"),
            Self::Darwin => write!(f, "darwin"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Abi {
    Gnu,
    Musl,
    None,
}

impl Abi {
    fn parse(s: &str) -> Result<Self, InvalidTriple<'_>> {
        match s {
            "gnu" => Ok(Self::Gnu),
            "musl" => Ok(Self::Musl),
            "none" => Ok(Self::None),
            _ => Err(InvalidTriple::AbiNotSupported),
        }
    }
}

impl Display for Abi {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Gnu => write!(f, "gnu"),
            Self::Musl => write!(f, "musl"),
            Self::None => write!(f, "none"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum InvalidTriple<'a> {
    #[error("the format of triple must be `architecture-os-abi`: but got `{0}`")]
    InvalidFormat(&'a str),

    #[error("given architecture is not supported")]
    ArchitectureNotSupported,

    #[error("given os is not supported")]
    OsNotSupported,

    #[error("given abi is not supported")]
    AbiNotSupported,

    #[error("given triple consists of invalid combination")]
    InvalidCombination,
}
