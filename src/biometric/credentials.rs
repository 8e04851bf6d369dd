use std::fmt;

use rand::Rng;
use rand::seq::SliceRandom;

const PASSWORD_LEN: usize = 12;
const UPPER: &[u8] = b"ABCDEFGHJKLMNPQRSTUVWXYZ";
const LOWER: &[u8] = b"abcdefghijkmnopqrstuvwxyz";
const DIGITS: &[u8] = b"23456789";
const SYMBOLS: &[u8] = b"!@#$%^&*";

/// Login credentials generated once, when an employee is first enrolled.
///
/// The backend is expected to hash the password on receipt; the client
/// only holds it long enough to submit the create request and show it to
/// the administrator once.
#[derive(Clone, PartialEq, Eq)]
pub struct Credentials {
    employee_id: String,
    password: String,
}

impl Credentials {
    pub fn generate() -> Self {
        let mut rng = rand::thread_rng();
        Self::generate_with(&mut rng)
    }

    pub fn generate_with<R: Rng + ?Sized>(rng: &mut R) -> Self {
        Self {
            employee_id: generate_employee_id(rng),
            password: generate_password(rng),
        }
    }

    pub fn employee_id(&self) -> &str {
        &self.employee_id
    }

    /// Employees sign in with their employee id.
    pub fn username(&self) -> &str {
        &self.employee_id
    }

    pub fn password(&self) -> &str {
        &self.password
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("employee_id", &self.employee_id)
            .field("password", &"********")
            .finish()
    }
}

/// `EMP-` followed by four decimal digits.
pub fn generate_employee_id<R: Rng + ?Sized>(rng: &mut R) -> String {
    format!("EMP-{:04}", rng.gen_range(0..10_000))
}

/// Twelve characters with at least one of each class. Look-alike glyphs
/// (`0/O`, `1/l/I`) are left out because the password is read off a
/// screen.
pub fn generate_password<R: Rng + ?Sized>(rng: &mut R) -> String {
    let classes = [UPPER, LOWER, DIGITS, SYMBOLS];
    let all: Vec<u8> = classes.concat();

    let mut chars: Vec<u8> = classes
        .iter()
        .filter_map(|class| class.choose(rng).copied())
        .collect();
    while chars.len() < PASSWORD_LEN {
        if let Some(c) = all.choose(rng) {
            chars.push(*c);
        }
    }
    chars.shuffle(rng);

    chars.into_iter().map(char::from).collect()
}
