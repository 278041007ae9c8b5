//! Integration tests

#![forbid(unsafe_code)]
#![warn(missing_docs, rust_2018_idioms, trivial_casts, unused_qualifications)]

use log::trace;
use once_cell::sync::Lazy;
use rfid_otp::{
    Authenticator, Config, CounterKeeper, Error, FileNvm, MemoryNvm, MemoryStore, SlotStore,
    Token,
};
use std::{
    env, fs,
    path::PathBuf,
    sync::{Arc, Mutex},
    thread,
};

/// Tag and reader sharing the factory identity
struct Pair {
    token: Token<SlotStore<MemoryNvm>>,
    reader: Arc<Mutex<Authenticator<SlotStore<MemoryNvm>>>>,
}

/// Provide thread-safe access to a provisioned tag and its reader
static PAIR: Lazy<Mutex<Pair>> = Lazy::new(init_pair);

/// One-time test initialization and setup
fn init_pair() -> Mutex<Pair> {
    // Only show logs if `RUST_LOG` is set
    if env::var("RUST_LOG").is_ok() {
        env_logger::builder().format_timestamp(None).init();
    }

    let config = Config::default();
    let token = Token::new(&config, SlotStore::open(MemoryNvm::new()).unwrap()).unwrap();
    let reader = Authenticator::new(&config, SlotStore::open(MemoryNvm::new()).unwrap()).unwrap();
    trace!("provisioned device {}", token.identity().id);

    Mutex::new(Pair {
        token,
        reader: Arc::new(Mutex::new(reader)),
    })
}

fn temp_state(label: &str) -> PathBuf {
    env::temp_dir().join(format!("rfid-otp-{}-{}.bin", label, uuid::Uuid::new_v4()))
}

//
// Tag and reader
//

#[test]
fn test_issued_code_accepted_once() {
    let mut pair = PAIR.lock().unwrap();
    let issued = pair.token.next_code().unwrap();

    let mut reader = pair.reader.lock().unwrap();
    let result = reader.authenticate(issued.code.as_bytes()).unwrap();
    assert_eq!(result.counter, issued.counter + 1);
    assert_eq!(
        reader.authenticate(issued.code.as_bytes()),
        Err(Error::NoMatch)
    );
}

#[test]
fn test_concurrent_presentations() {
    let mut pair = PAIR.lock().unwrap();
    let issued = pair.token.next_code().unwrap();
    let code = issued.code.as_bytes().to_vec();

    let handles: Vec<_> = (0..8)
        .map(|_| {
            let reader = Arc::clone(&pair.reader);
            let code = code.clone();
            thread::spawn(move || reader.lock().unwrap().authenticate(&code))
        })
        .collect();

    let results: Vec<_> = handles.into_iter().map(|h| h.join().unwrap()).collect();
    let accepted = results.iter().filter(|r| r.is_ok()).count();

    assert_eq!(accepted, 1);
    assert!(results
        .iter()
        .filter_map(|r| r.as_ref().err())
        .all(|e| *e == Error::NoMatch));
    assert_eq!(
        pair.reader.lock().unwrap().counter().value,
        pair.token.counter().value
    );
}

//
// Counter keeping
//

#[test]
fn test_concurrent_stale_updates() {
    let keeper = Arc::new(Mutex::new(
        CounterKeeper::open(MemoryStore::new()).unwrap(),
    ));

    let handles: Vec<_> = (1..=16u64)
        .rev()
        .map(|value| {
            let keeper = Arc::clone(&keeper);
            thread::spawn(move || keeper.lock().unwrap().advance_to(value))
        })
        .collect();

    let mut accepted = 0;
    for handle in handles {
        match handle.join().unwrap() {
            Ok(()) => accepted += 1,
            Err(Error::StaleUpdate { current, requested }) => assert!(requested <= current),
            Err(err) => panic!("unexpected error: {:?}", err),
        }
    }

    assert!(accepted >= 1);
    let keeper = keeper.lock().unwrap();
    assert_eq!(keeper.current().value, 16);
    assert_eq!(keeper.store().value(), Some(16));
}

#[test]
fn test_power_loss_during_acceptance() {
    let config = Config::default();
    let mut reader = Authenticator::new(&config, SlotStore::open(MemoryNvm::new()).unwrap()).unwrap();
    reader.authenticate(b"861827").unwrap();

    // lose power halfway through committing the next acceptance
    let mut nvm = reader.into_inner().into_inner();
    nvm.tear_next_write(10);
    let mut reader = Authenticator::new(&config, SlotStore::open(nvm).unwrap()).unwrap();
    assert_eq!(reader.authenticate(b"224008"), Err(Error::DesyncError));

    // after restart the previous counter survives and the code was not consumed
    let nvm = reader.into_inner().into_inner();
    let mut reader = Authenticator::new(&config, SlotStore::open(nvm).unwrap()).unwrap();
    assert_eq!(reader.counter().value, 1);
    assert_eq!(reader.authenticate(b"224008").unwrap().counter, 2);
}

#[test]
fn test_power_loss_during_first_acceptance() {
    let config = Config::default();
    let mut nvm = MemoryNvm::new();
    nvm.tear_next_write(9);

    let mut reader = Authenticator::new(&config, SlotStore::open(nvm).unwrap()).unwrap();
    assert_eq!(reader.authenticate(b"861827"), Err(Error::DesyncError));

    // the reader still boots after restart and the code was not consumed
    let nvm = reader.into_inner().into_inner();
    let mut reader = Authenticator::new(&config, SlotStore::open(nvm).unwrap()).unwrap();
    assert_eq!(reader.counter().value, 0);
    assert_eq!(reader.authenticate(b"861827").unwrap().counter, 1);
}

//
// File-backed state
//

#[test]
fn test_file_state_survives_restart() {
    let config = Config::default();
    let tag_path = temp_state("tag");
    let reader_path = temp_state("reader");

    let mut codes = vec![];
    {
        let mut token =
            Token::new(&config, SlotStore::open(FileNvm::open(&tag_path).unwrap()).unwrap())
                .unwrap();

        for _ in 0..3 {
            codes.push(token.next_code().unwrap());
        }
    }

    {
        let mut reader = Authenticator::new(
            &config,
            SlotStore::open(FileNvm::open(&reader_path).unwrap()).unwrap(),
        )
        .unwrap();

        let result = reader.authenticate(codes[2].code.as_bytes()).unwrap();
        assert_eq!(result.offset, 2);
        assert_eq!(result.counter, 3);
    }

    let mut reader = Authenticator::new(
        &config,
        SlotStore::open(FileNvm::open(&reader_path).unwrap()).unwrap(),
    )
    .unwrap();
    assert_eq!(reader.counter().value, 3);
    assert_eq!(
        reader.authenticate(codes[0].code.as_bytes()),
        Err(Error::NoMatch)
    );

    let token =
        Token::new(&config, SlotStore::open(FileNvm::open(&tag_path).unwrap()).unwrap()).unwrap();
    assert_eq!(token.counter().value, 3);

    fs::remove_file(tag_path).unwrap();
    fs::remove_file(reader_path).unwrap();
}

//
// Configuration
//

#[test]
fn test_provisioned_config_file() {
    let path = env::temp_dir().join(format!("rfid-otp-{}.conf", uuid::Uuid::new_v4()));
    fs::write(
        &path,
        "# provisioned tag\nID = 0x2a\nKEY = hex:3132333435363738393031323334353637383930\nKEY_LENGTH = 20\nDIGITS = 8\nWINDOW = 2\n",
    )
    .unwrap();

    let config = Config::load(&path).unwrap();
    fs::remove_file(&path).unwrap();

    let mut token = Token::new(&config, MemoryStore::new()).unwrap();
    let mut reader = Authenticator::new(&config, MemoryStore::new()).unwrap();
    assert_eq!(u16::from(reader.identity().id), 42);

    let skipped: Vec<_> = (0..3).map(|_| token.next_code().unwrap()).collect();
    assert!(skipped.iter().all(|issued| issued.code.len() == 8));

    // a window of 2 reaches the third code
    let result = reader.authenticate(skipped[2].code.as_bytes()).unwrap();
    assert_eq!(result.offset, 2);

    // but not one issued three ahead
    for _ in 0..3 {
        token.next_code().unwrap();
    }
    let ahead = token.next_code().unwrap();
    assert_eq!(
        reader.authenticate(ahead.code.as_bytes()),
        Err(Error::NoMatch)
    );
}
