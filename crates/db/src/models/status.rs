//! Status helper enums mapping to SMALLSERIAL lookup tables.
//!
//! Each enum variant's discriminant matches the seed data in the
//! corresponding `*_statuses` table.

/// Status ID type matching SMALLINT/SMALLSERIAL in the database.
pub type StatusId = i16;

macro_rules! define_status_enum {
    (
        $(#[$meta:meta])*
        $name:ident {
            $( $(#[$vmeta:meta])* $variant:ident = $val:literal => $label:literal ),+ $(,)?
        }
    ) => {
        $(#[$meta])*
        #[repr(i16)]
        #[derive(Debug, Clone, Copy, PartialEq, Eq)]
        pub enum $name {
            $( $(#[$vmeta])* $variant = $val ),+
        }

        impl $name {
            /// Return the database status ID.
            pub fn id(self) -> StatusId {
                self as StatusId
            }

            /// Return the seed-data name of this status.
            pub fn name(self) -> &'static str {
                match self {
                    $( Self::$variant => $label ),+
                }
            }

            /// Look up a status by database ID.
            pub fn from_id(id: StatusId) -> Option<Self> {
                match id {
                    $( $val => Some(Self::$variant), )+
                    _ => None,
                }
            }
        }

        impl From<$name> for StatusId {
            fn from(value: $name) -> Self {
                value as StatusId
            }
        }
    };
}

define_status_enum! {
    /// Bulk mail job lifecycle (`mail_job_statuses`).
    MailJobStatus {
        Pending = 1 => "pending",
        Running = 2 => "running",
        Completed = 3 => "completed",
        Failed = 4 => "failed",
        Cancelled = 5 => "cancelled",
    }
}

impl MailJobStatus {
    /// Completed, failed, and cancelled jobs never change again.
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Completed | Self::Failed | Self::Cancelled)
    }
}
