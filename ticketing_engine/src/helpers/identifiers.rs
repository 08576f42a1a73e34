use rand::{distributions::Uniform, Rng};
use uuid::Uuid;

pub const MAX_TICKET_NUMBER_ATTEMPTS: usize = 10;

/// `order_` followed by the first 12 hex characters of a fresh v4 UUID.
pub fn new_order_id() -> String {
    let uuid = Uuid::new_v4().simple().to_string();
    format!("order_{}", &uuid[..12])
}

/// Two random uppercase letters followed by six random digits, e.g. `QX481902`.
pub fn random_ticket_number<R: Rng>(rng: &mut R) -> String {
    let letters = Uniform::from(b'A'..=b'Z');
    let digits = Uniform::from(0..1_000_000u32);
    let prefix = (0..2).map(|_| rng.sample(letters) as char).collect::<String>();
    format!("{prefix}{:06}", rng.sample(digits))
}

/// Used when random numbers keep colliding. `TX` followed by 8 uppercase hex characters.
pub fn fallback_ticket_number() -> String {
    let uuid = Uuid::new_v4().simple().to_string().to_uppercase();
    format!("TX{}", &uuid[..8])
}

/// Picks a ticket number for which `is_taken` returns false, giving up on random numbers after
/// [`MAX_TICKET_NUMBER_ATTEMPTS`] tries.
pub fn pick_ticket_number<F>(mut is_taken: F) -> String
where F: FnMut(&str) -> bool {
    let mut rng = rand::thread_rng();
    for _ in 0..MAX_TICKET_NUMBER_ATTEMPTS {
        let candidate = random_ticket_number(&mut rng);
        if !is_taken(&candidate) {
            return candidate;
        }
    }
    fallback_ticket_number()
}

pub fn new_secure_token() -> String {
    Uuid::new_v4().to_string()
}

pub fn new_invoice_number() -> String {
    let uuid = Uuid::new_v4().simple().to_string().to_uppercase();
    format!("INV-{}", &uuid[..8])
}

/// The customer reference sent to the payment gateway.
pub fn gateway_customer_id(customer_id: i64) -> String {
    format!("user_{customer_id:03}")
}
