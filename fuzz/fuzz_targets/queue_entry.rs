#![no_main]

use libfuzzer_sys::fuzz_target;
use warden_command_queue::{Command, CommandStatus};

const ALL: [CommandStatus; 6] = [
    CommandStatus::Pending,
    CommandStatus::Sent,
    CommandStatus::AwaitingOutput,
    CommandStatus::Completed,
    CommandStatus::TimedOut,
    CommandStatus::Failed,
];

fuzz_target!(|data: &[u8]| {
    // 손상된 엔트리는 에러여야 하고 패닉이면 안 됨
    let Ok(command) = serde_json::from_slice::<Command>(data) else {
        return;
    };

    for next in ALL {
        if let Ok(advanced) = command.advance(next) {
            assert!(command.status.can_transition_to(next));
            assert_eq!(advanced.status, next);
        }
    }
});
