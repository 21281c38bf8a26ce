use std::sync::LazyLock;

use regex::Regex;
use ulid::Ulid;

use crate::config::RegistryDefaults;
use crate::limits::*;
use crate::model::*;

use super::store::InMemoryStore;
use super::validate::{max_len, optional, parse_ref, required};
use super::EngineError;

static EMAIL: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[^\s@]+@[^\s@]+\.[^\s@]+$").expect("valid email pattern"));

static DIGITS: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^\d+$").expect("valid digits pattern"));

fn email(value: &str) -> Result<String, EngineError> {
    max_len("email", value, MAX_EMAIL_LEN)?;
    if !EMAIL.is_match(value) {
        return Err(EngineError::InvalidFormat {
            field: "email",
            expected: "local@domain.tld",
        });
    }
    Ok(value.to_lowercase())
}

// ── Owners ───────────────────────────────────────────────────────

pub fn validate_owner(id: Ulid, input: &OwnerInput) -> Result<Owner, EngineError> {
    let name = required("name", &input.name)?;
    let phone = required("phone", &input.phone)?;
    let address = required("address", &input.address)?;
    let email_raw = required("email", &input.email)?;

    max_len("name", name, MAX_NAME_LEN)?;
    max_len("address", address, MAX_OWNER_ADDRESS_LEN)?;
    let email = email(email_raw)?;
    max_len("phone", phone, MAX_PHONE_LEN)?;
    if !DIGITS.is_match(phone) {
        return Err(EngineError::InvalidFormat {
            field: "phone",
            expected: "digits only",
        });
    }

    Ok(Owner {
        id,
        name: name.to_string(),
        phone: phone.to_string(),
        address: address.to_string(),
        email,
    })
}

// ── Walkers ──────────────────────────────────────────────────────

/// Email and id number must not belong to any walker other than `id`.
pub fn validate_walker(
    store: &InMemoryStore,
    defaults: &RegistryDefaults,
    id: Ulid,
    input: &WalkerInput,
) -> Result<Walker, EngineError> {
    let name = required("name", &input.name)?;
    let id_number = required("id_number", &input.id_number)?;
    let phone = required("phone", &input.phone)?;
    let email_raw = required("email", &input.email)?;
    let company_phone = required("company_phone", &input.company_phone)?;
    let company_address = required("company_address", &input.company_address)?;
    let address = required("address", &input.address)?;
    let rate_raw = required("rate", &input.rate)?;

    let id_type = match optional(&input.id_type) {
        None => defaults.walker_id_type,
        Some(s) => s.parse().map_err(|_| EngineError::InvalidEnum {
            field: "id_type",
            value: s.to_string(),
            allowed: "CC, CE, PP",
        })?,
    };

    max_len("name", name, MAX_NAME_LEN)?;
    max_len("id_number", id_number, MAX_ID_NUMBER_LEN)?;
    max_len("phone", phone, MAX_PHONE_LEN)?;
    let email = email(email_raw)?;
    max_len("company_phone", company_phone, MAX_COMPANY_PHONE_LEN)?;
    max_len("company_address", company_address, MAX_WALKER_ADDRESS_LEN)?;
    max_len("address", address, MAX_WALKER_ADDRESS_LEN)?;

    let rate = match rate_raw.parse::<f64>() {
        Ok(r) if r.is_finite() && r > 0.0 => r,
        _ => {
            return Err(EngineError::OutOfRange {
                field: "rate",
                reason: "must be a positive number".into(),
            });
        }
    };

    let rating = match optional(&input.rating) {
        None => defaults.walker_rating,
        Some(s) => match s.parse::<u8>() {
            Ok(r) if (MIN_RATING..=MAX_RATING).contains(&r) => r,
            _ => {
                return Err(EngineError::OutOfRange {
                    field: "rating",
                    reason: format!("must be between {MIN_RATING} and {MAX_RATING}"),
                });
            }
        },
    };

    if store.walker_with_email(&email, Some(id)).is_some() {
        return Err(EngineError::AlreadyExists { field: "email", value: email });
    }
    if store.walker_with_id_number(id_number, Some(id)).is_some() {
        return Err(EngineError::AlreadyExists {
            field: "id_number",
            value: id_number.to_string(),
        });
    }

    Ok(Walker {
        id,
        name: name.to_string(),
        id_type,
        id_number: id_number.to_string(),
        phone: phone.to_string(),
        email,
        company_phone: company_phone.to_string(),
        company_address: company_address.to_string(),
        address: address.to_string(),
        rate,
        rating,
    })
}

// ── Pets ─────────────────────────────────────────────────────────

pub fn validate_pet(store: &InMemoryStore, id: Ulid, input: &PetInput) -> Result<Pet, EngineError> {
    let name = required("name", &input.name)?;
    let species = required("species", &input.species)?;
    let breed = required("breed", &input.breed)?;
    let age_raw = required("age", &input.age)?;
    let gender_raw = required("gender", &input.gender)?;
    let owner_raw = required("owner_id", &input.owner_id)?;

    max_len("name", name, MAX_NAME_LEN)?;
    max_len("species", species, MAX_SPECIES_LEN)?;
    max_len("breed", breed, MAX_BREED_LEN)?;

    let age: u32 = age_raw.parse().map_err(|_| EngineError::OutOfRange {
        field: "age",
        reason: "must be a non-negative whole number".into(),
    })?;

    let gender: Gender = gender_raw.parse().map_err(|_| EngineError::InvalidEnum {
        field: "gender",
        value: gender_raw.to_string(),
        allowed: "male, female",
    })?;

    let owner_id = parse_ref("owner", owner_raw)?;
    if !store.contains_owner(&owner_id) {
        return Err(EngineError::not_found("owner", owner_raw));
    }

    let special_recommendations = optional(&input.special_recommendations).unwrap_or_default();
    max_len("special_recommendations", special_recommendations, MAX_RECOMMENDATIONS_LEN)?;

    Ok(Pet {
        id,
        owner_id,
        name: name.to_string(),
        species: species.to_string(),
        breed: breed.to_string(),
        age,
        gender,
        special_recommendations: special_recommendations.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn s(v: &str) -> Option<String> {
        Some(v.to_string())
    }

    fn owner_input() -> OwnerInput {
        OwnerInput {
            name: s(" Olga Ruiz "),
            phone: s("3001234567"),
            address: s("Calle 10 # 4-21"),
            email: s("Olga@Example.com"),
        }
    }

    fn walker_input(email: &str, id_number: &str) -> WalkerInput {
        WalkerInput {
            name: s("Ana"),
            id_type: None,
            id_number: s(id_number),
            phone: s("3000000000"),
            email: s(email),
            company_phone: s("6041234"),
            company_address: s("Carrera 7"),
            address: s("Calle 80"),
            rate: s("12.5"),
            rating: None,
        }
    }

    #[test]
    fn owner_is_normalized() {
        let owner = validate_owner(Ulid::new(), &owner_input()).unwrap();
        assert_eq!(owner.name, "Olga Ruiz");
        assert_eq!(owner.email, "olga@example.com");
    }

    #[test]
    fn owner_rules() {
        let mut inp = owner_input();
        inp.phone = s("300-123");
        assert!(matches!(
            validate_owner(Ulid::new(), &inp),
            Err(EngineError::InvalidFormat { field: "phone", .. })
        ));

        let mut inp = owner_input();
        inp.address = s(&"a".repeat(51));
        assert!(matches!(
            validate_owner(Ulid::new(), &inp),
            Err(EngineError::TooLong { field: "address", max: 50 })
        ));

        let mut inp = owner_input();
        inp.email = s("olga.example.com");
        assert!(matches!(
            validate_owner(Ulid::new(), &inp),
            Err(EngineError::InvalidFormat { field: "email", .. })
        ));

        let mut inp = owner_input();
        inp.name = None;
        assert!(matches!(validate_owner(Ulid::new(), &inp), Err(EngineError::MissingField("name"))));
    }

    #[test]
    fn walker_defaults_applied() {
        let store = InMemoryStore::new();
        let w = validate_walker(&store, &RegistryDefaults::default(), Ulid::new(), &walker_input("ANA@x.co", "123")).unwrap();
        assert_eq!(w.id_type, IdType::Cc);
        assert_eq!(w.rating, 1);
        assert_eq!(w.email, "ana@x.co");
        assert_eq!(w.rate, 12.5);
    }

    #[test]
    fn walker_field_rules() {
        let store = InMemoryStore::new();
        let d = RegistryDefaults::default();

        let mut inp = walker_input("ana@x.co", "123");
        inp.id_type = s("DNI");
        assert!(matches!(
            validate_walker(&store, &d, Ulid::new(), &inp),
            Err(EngineError::InvalidEnum { field: "id_type", .. })
        ));

        for bad in ["0", "-3", "cheap"] {
            let mut inp = walker_input("ana@x.co", "123");
            inp.rate = s(bad);
            assert!(matches!(
                validate_walker(&store, &d, Ulid::new(), &inp),
                Err(EngineError::OutOfRange { field: "rate", .. })
            ));
        }

        for bad in ["0", "11", "ten"] {
            let mut inp = walker_input("ana@x.co", "123");
            inp.rating = s(bad);
            assert!(matches!(
                validate_walker(&store, &d, Ulid::new(), &inp),
                Err(EngineError::OutOfRange { field: "rating", .. })
            ));
        }

        let mut inp = walker_input("ana@x.co", "123");
        inp.rating = s("10");
        inp.id_type = s("PP");
        let w = validate_walker(&store, &d, Ulid::new(), &inp).unwrap();
        assert_eq!((w.rating, w.id_type), (10, IdType::Pp));
    }

    #[test]
    fn walker_uniqueness_ignores_self() {
        let store = InMemoryStore::new();
        let d = RegistryDefaults::default();
        let id = Ulid::new();
        let w = validate_walker(&store, &d, id, &walker_input("ana@x.co", "123")).unwrap();
        store.apply_event(&Event::WalkerSaved { walker: w });

        // Re-saving the same walker is fine.
        assert!(validate_walker(&store, &d, id, &walker_input("ANA@x.co", "123")).is_ok());

        let other = Ulid::new();
        assert!(matches!(
            validate_walker(&store, &d, other, &walker_input("Ana@X.co", "999")),
            Err(EngineError::AlreadyExists { field: "email", .. })
        ));
        assert!(matches!(
            validate_walker(&store, &d, other, &walker_input("beto@x.co", "123")),
            Err(EngineError::AlreadyExists { field: "id_number", .. })
        ));
    }

    #[test]
    fn pet_rules() {
        let store = InMemoryStore::new();
        let owner = validate_owner(Ulid::new(), &owner_input()).unwrap();
        store.apply_event(&Event::OwnerSaved { owner: owner.clone() });

        let base = PetInput {
            owner_id: s(&owner.id.to_string()),
            name: s("Rex"),
            species: s("dog"),
            breed: s("beagle"),
            age: s("4"),
            gender: s("male"),
            special_recommendations: None,
        };
        let pet = validate_pet(&store, Ulid::new(), &base).unwrap();
        assert_eq!(pet.age, 4);
        assert_eq!(pet.special_recommendations, "");

        let mut inp = base.clone();
        inp.age = s("-1");
        assert!(matches!(
            validate_pet(&store, Ulid::new(), &inp),
            Err(EngineError::OutOfRange { field: "age", .. })
        ));

        let mut inp = base.clone();
        inp.gender = s("unknown");
        assert!(matches!(
            validate_pet(&store, Ulid::new(), &inp),
            Err(EngineError::InvalidEnum { field: "gender", .. })
        ));

        let mut inp = base.clone();
        inp.owner_id = s(&Ulid::new().to_string());
        assert!(matches!(
            validate_pet(&store, Ulid::new(), &inp),
            Err(EngineError::NotFound { kind: "owner", .. })
        ));

        let mut inp = base;
        inp.special_recommendations = s(&"r".repeat(501));
        assert!(matches!(
            validate_pet(&store, Ulid::new(), &inp),
            Err(EngineError::TooLong { field: "special_recommendations", .. })
        ));
    }
}
