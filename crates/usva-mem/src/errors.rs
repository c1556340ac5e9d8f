#[derive(Clone, Copy, Debug)]
pub enum CapacityError {
    AllocFailed {
        new_capacity: usize,
    },
    MaxCapacityExceeded {
        max_capacity: usize,
    },
    ZeroSizedElement,
}

impl core::fmt::Display for CapacityError {

    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Self::AllocFailed { new_capacity } => {
                write!(f, "allocation failed with new capacity {}", new_capacity)
            },
            Self::MaxCapacityExceeded { max_capacity } => {
                write!(f, "exceeded maximum capacity of {}", max_capacity)
            },
            Self::ZeroSizedElement => {
                write!(f, "size of element type is zero")
            },
        }
    }
}

impl core::error::Error for CapacityError {}
