use std::fmt;

use crate::cmd::Cmd;

/// Distribution family, as far as package names and the nginx
/// directory layout are concerned.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PackageFamily {
    Debian,
    RedHat,
}

/// Package manager found on the host.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PackageManager {
    Apt,
    Dnf,
    Yum,
}

impl PackageManager {
    /// Probe order: the first binary present on the host wins.
    pub const ALL: [Self; 3] = [Self::Apt, Self::Dnf, Self::Yum];

    #[must_use]
    pub const fn binary(self) -> &'static str {
        match self {
            Self::Apt => "apt-get",
            Self::Dnf => "dnf",
            Self::Yum => "yum",
        }
    }

    #[must_use]
    pub const fn family(self) -> PackageFamily {
        match self {
            Self::Apt => PackageFamily::Debian,
            Self::Dnf | Self::Yum => PackageFamily::RedHat,
        }
    }

    /// Refresh package indexes before installing, where the manager
    /// needs it.
    #[must_use]
    pub fn refresh(self) -> Option<Cmd> {
        match self {
            Self::Apt => Some(Cmd::new("apt-get").args(["update", "-q"]).sudo()),
            Self::Dnf | Self::Yum => None,
        }
    }

    #[must_use]
    pub fn install(self, packages: &[&str]) -> Cmd {
        let cmd = match self {
            Self::Apt => Cmd::new("env").args([
                "DEBIAN_FRONTEND=noninteractive",
                "apt-get",
                "install",
                "-y",
                "-q",
            ]),
            Self::Dnf | Self::Yum => Cmd::new(self.binary()).args(["install", "-y", "-q"]),
        };
        cmd.args(packages.iter().copied()).sudo()
    }
}

impl fmt::Display for PackageManager {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.binary())
    }
}

/// A tool the host must provide, with the check that proves it is
/// there and the package that provides it per family.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Tool {
    Docker,
    Compose,
    Nginx,
    Rsync,
    Curl,
}

impl Tool {
    pub const ALL: [Self; 5] = [
        Self::Docker,
        Self::Compose,
        Self::Nginx,
        Self::Rsync,
        Self::Curl,
    ];

    #[must_use]
    pub fn presence_check(self) -> Cmd {
        match self {
            Self::Docker => Cmd::new("command").args(["-v", "docker"]),
            // Either the plugin or the standalone binary will do.
            Self::Compose => Cmd::new("docker")
                .args(["compose", "version"])
                .sudo(),
            Self::Nginx => Cmd::new("command").args(["-v", "nginx"]),
            Self::Rsync => Cmd::new("command").args(["-v", "rsync"]),
            Self::Curl => Cmd::new("command").args(["-v", "curl"]),
        }
    }

    /// Fallback check tried when `presence_check` fails.
    #[must_use]
    pub fn alternate_check(self) -> Option<Cmd> {
        match self {
            Self::Compose => Some(Cmd::new("command").args(["-v", "docker-compose"])),
            // /usr/sbin is not always on a non-root PATH.
            Self::Nginx => Some(Cmd::new("test").args(["-x", "/usr/sbin/nginx"])),
            _ => None,
        }
    }

    /// Package name in the distribution's own repositories.
    #[must_use]
    pub const fn package(self, family: PackageFamily) -> &'static str {
        match (self, family) {
            (Self::Docker, PackageFamily::Debian) => "docker.io",
            (Self::Docker, PackageFamily::RedHat) => "docker",
            (Self::Compose, _) => "docker-compose",
            (Self::Nginx, _) => "nginx",
            (Self::Rsync, _) => "rsync",
            (Self::Curl, _) => "curl",
        }
    }
}
