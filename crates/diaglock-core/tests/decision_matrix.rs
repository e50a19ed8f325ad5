use diaglock_core::config::DiagLockConfig;
use diaglock_core::error::DiagLockError;
use diaglock_core::identity::{DIAG_ENABLE_OFFSET, VENDOR_RECORD_LEN};
use diaglock_core::policy::{BuildProfile, CarrierVariant, Opcode};
use diaglock_core::provider::{BoardInfo, Operator, SharedMemory, SmemId, SMEM_ID_VENDOR0};
use diaglock_core::service::DiagLockService;
use diaglock_core::state::LockState;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::thread;

#[test]
fn unlocked_state_allows_every_opcode_on_every_profile() {
    for profile in BuildProfile::ALL {
        for operator in operators() {
            let board = MockBoard::new(false, operator.clone());
            let service = boot(profile, board, MockRegion::empty());
            service.attribute().store("1").unwrap();
            for byte in 0..=u8::MAX {
                assert!(
                    service.is_command_allowed(Some(Opcode(byte))),
                    "{profile}/{operator}: {byte:#04x} denied while unlocked"
                );
            }
        }
    }
}

#[test]
fn locked_state_allows_exactly_the_variant_allow_list() {
    for profile in BuildProfile::ALL {
        for operator in operators() {
            let board = MockBoard::new(false, operator.clone());
            let service = boot(profile, board, MockRegion::empty());
            assert_eq!(service.lock_state(), LockState::Locked);

            let list = service.carrier_variant().allow_list();
            for byte in 0..=u8::MAX {
                let opcode = Opcode(byte);
                assert_eq!(
                    service.is_command_allowed(Some(opcode)),
                    list.contains(opcode),
                    "{profile}/{operator}: {opcode}"
                );
            }
        }
    }
}

#[test]
fn absent_opcode_is_always_denied() {
    for profile in BuildProfile::ALL {
        let service = boot(
            profile,
            MockBoard::new(true, Operator::Other("OPEN".into())),
            MockRegion::empty(),
        );
        for value in ["0", "1"] {
            service.attribute().store(value).unwrap();
            assert!(!service.is_command_allowed(None));
            assert!(!service.engine().is_packet_allowed(None));
        }
    }
}

#[test]
fn default_and_sprint_scenarios() {
    let default = boot(
        BuildProfile::Generic,
        MockBoard::new(false, Operator::Other(String::new())),
        MockRegion::empty(),
    );
    assert!(default.is_command_allowed(Some(Opcode(0x29))));
    assert!(!default.is_command_allowed(Some(Opcode(0x05))));

    let sprint = boot(
        BuildProfile::Sprint,
        MockBoard::new(false, Operator::SprUs),
        MockRegion::with_flag(0),
    );
    assert!(!sprint.is_command_allowed(Some(Opcode(0x29))));
    assert!(sprint.is_command_allowed(Some(Opcode(0xA1))));
}

#[test]
fn boot_override_follows_identity_record() {
    let enabled = boot(
        BuildProfile::Sprint,
        MockBoard::new(false, Operator::SprUs),
        MockRegion::with_flag(1),
    );
    assert_eq!(enabled.lock_state(), LockState::Unlocked);
    assert_eq!(enabled.attribute().show(), "1");

    let disabled = boot(
        BuildProfile::Sprint,
        MockBoard::new(false, Operator::SprUs),
        MockRegion::with_flag(0),
    );
    assert_eq!(disabled.lock_state(), LockState::Locked);

    let absent = boot(
        BuildProfile::Sprint,
        MockBoard::new(false, Operator::SprUs),
        MockRegion::empty(),
    );
    assert_eq!(absent.lock_state(), LockState::Locked);
}

#[test]
fn boot_override_reads_vendor_entry_once() {
    let region = MockRegion::with_flag(1);
    let _service = boot(
        BuildProfile::Sprint,
        MockBoard::new(false, Operator::SprUs),
        region.clone(),
    );
    assert_eq!(region.reads(), vec![SMEM_ID_VENDOR0]);

    let untouched = MockRegion::with_flag(1);
    let _service = boot(
        BuildProfile::Verizon,
        MockBoard::new(false, Operator::VzwPostpaid),
        untouched.clone(),
    );
    assert!(untouched.reads().is_empty());
}

#[test]
fn boot_override_reads_configured_entry() {
    let region = MockRegion::empty();
    let mut record = vec![0u8; VENDOR_RECORD_LEN];
    record[DIAG_ENABLE_OFFSET] = 1;
    region.insert(SmemId(135), record);

    let mut config = DiagLockConfig::default();
    config.policy.profile = BuildProfile::Sprint;
    config.identity.entry_id = 135;
    let service = DiagLockService::boot(
        Arc::new(config),
        MockBoard::new(false, Operator::SprUs),
        &region,
    )
    .expect("non-default entry id is accepted");

    assert_eq!(region.reads(), vec![SmemId(135)]);
    assert_eq!(service.lock_state(), LockState::Unlocked);
}

#[test]
fn unknown_unified_variant_falls_back_to_default_list() {
    let service = boot(
        BuildProfile::Unified,
        MockBoard::new(false, Operator::Other("TMO".into())),
        MockRegion::empty(),
    );
    assert_eq!(
        service.carrier_variant(),
        CarrierVariant::Unrecognized("TMO".into())
    );
    assert!(service.is_command_allowed(Some(Opcode(0xEF))));
}

#[test]
fn unified_variant_is_resolved_per_query() {
    let board = MockBoard::new(false, Operator::SprUs);
    let service = boot(BuildProfile::Unified, board.clone(), MockRegion::empty());
    assert!(!service.is_command_allowed(Some(Opcode::AT_COMMAND_LOCK)));

    board.set_operator(Operator::VzwPrepaid);
    assert!(service.is_command_allowed(Some(Opcode::AT_COMMAND_LOCK)));
    assert!(!service.is_command_allowed(Some(Opcode::PORT_LOCK)));
}

#[test]
fn factory_boot_bypasses_lock_except_for_sprint() {
    let board = MockBoard::new(true, Operator::VzwPostpaid);
    let service = boot(BuildProfile::Verizon, board.clone(), MockRegion::empty());
    assert!(service.is_unlocked_or_factory_exempt());
    assert!(service.is_command_allowed(Some(Opcode(0x05))));

    board.set_operator(Operator::SprUs);
    assert!(!service.is_unlocked_or_factory_exempt());
    assert!(!service.is_command_allowed(Some(Opcode(0x05))));
}

#[test]
fn attribute_round_trip_and_rejection() {
    let service = boot(
        BuildProfile::Generic,
        MockBoard::new(false, Operator::Other(String::new())),
        MockRegion::empty(),
    );
    let attr = service.attribute();

    attr.store("1").unwrap();
    assert_eq!(attr.show(), "1");
    attr.store("0").unwrap();
    assert_eq!(attr.show(), "0");

    attr.store("1").unwrap();
    let err = attr.store("abc").expect_err("abc must be rejected");
    assert!(matches!(err, DiagLockError::InvalidArgument(_)));
    assert_eq!(attr.show(), "1");
}

#[test]
fn mutator_round_trip_is_idempotent() {
    let service = boot(
        BuildProfile::Sprint,
        MockBoard::new(false, Operator::SprUs),
        MockRegion::empty(),
    );
    let mutator = service.mutator().expect("sprint exports a mutator");

    for unlocked in [true, true, false, false, true] {
        mutator.set_lock_state(unlocked);
        assert_eq!(service.lock_state().is_unlocked(), unlocked);
    }
}

#[test]
fn concurrent_toggle_and_classification() {
    let service = Arc::new(boot(
        BuildProfile::Sprint,
        MockBoard::new(false, Operator::SprUs),
        MockRegion::empty(),
    ));

    let toggler = {
        let attr = service.attribute();
        thread::spawn(move || {
            for round in 0..5_000 {
                attr.store(if round % 2 == 0 { "1" } else { "0" }).unwrap();
            }
        })
    };

    let classifiers: Vec<_> = (0..4)
        .map(|_| {
            let service = service.clone();
            thread::spawn(move || {
                for _ in 0..5_000 {
                    // Port lock is on the Sprint list, so it passes in either state.
                    assert!(service.is_command_allowed(Some(Opcode::PORT_LOCK)));
                    let shown = service.attribute().show();
                    assert!(shown == "0" || shown == "1");
                }
            })
        })
        .collect();

    toggler.join().unwrap();
    for handle in classifiers {
        handle.join().unwrap();
    }
}

fn operators() -> Vec<Operator> {
    vec![
        Operator::SprUs,
        Operator::VzwPostpaid,
        Operator::VzwPrepaid,
        Operator::Other("ATT".into()),
    ]
}

fn boot(profile: BuildProfile, board: MockBoard, region: MockRegion) -> DiagLockService<MockBoard> {
    let mut config = DiagLockConfig::default();
    config.policy.profile = profile;
    config.policy.factory_exemption = Some(profile != BuildProfile::Sprint);
    DiagLockService::boot(Arc::new(config), board, &region).expect("service boots")
}

#[derive(Clone)]
struct MockBoard {
    factory: bool,
    operator: Arc<Mutex<Operator>>,
}

impl MockBoard {
    fn new(factory: bool, operator: Operator) -> Self {
        Self {
            factory,
            operator: Arc::new(Mutex::new(operator)),
        }
    }

    fn set_operator(&self, operator: Operator) {
        *self.operator.lock().unwrap() = operator;
    }
}

impl BoardInfo for MockBoard {
    fn factory_boot(&self) -> bool {
        self.factory
    }

    fn operator(&self) -> Operator {
        self.operator.lock().unwrap().clone()
    }
}

#[derive(Clone)]
struct MockRegion {
    entries: Arc<Mutex<HashMap<SmemId, Vec<u8>>>>,
    reads: Arc<Mutex<Vec<SmemId>>>,
}

impl MockRegion {
    fn empty() -> Self {
        Self {
            entries: Arc::new(Mutex::new(HashMap::new())),
            reads: Arc::new(Mutex::new(Vec::new())),
        }
    }

    fn with_flag(diag_enable: u8) -> Self {
        let region = Self::empty();
        let mut record = vec![0u8; VENDOR_RECORD_LEN];
        record[DIAG_ENABLE_OFFSET] = diag_enable;
        region.insert(SMEM_ID_VENDOR0, record);
        region
    }

    fn insert(&self, id: SmemId, bytes: Vec<u8>) {
        self.entries.lock().unwrap().insert(id, bytes);
    }

    fn reads(&self) -> Vec<SmemId> {
        self.reads.lock().unwrap().clone()
    }
}

impl SharedMemory for MockRegion {
    type Error = DiagLockError;

    fn entry(&self, id: SmemId) -> Result<Option<Vec<u8>>, Self::Error> {
        self.reads.lock().unwrap().push(id);
        Ok(self.entries.lock().unwrap().get(&id).cloned())
    }
}
