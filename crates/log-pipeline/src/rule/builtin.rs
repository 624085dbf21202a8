//! 내장 규칙 세트 -- 바닐라 Minecraft 서버 로그 형식
//!
//! 채팅 규칙이 입장/퇴장 규칙보다 앞에 있어야 합니다.
//! `<Alice> Bob joined the game` 같은 채팅이 입장 이벤트로 매칭되지 않도록 하기 위함입니다.

use super::types::LineRule;

pub const KIND_SERVER_READY: &str = "ServerReady";
pub const KIND_PLAYER_CHAT: &str = "PlayerChat";
pub const KIND_PLAYER_JOIN: &str = "PlayerJoin";
pub const KIND_PLAYER_LEAVE: &str = "PlayerLeave";
pub const KIND_PLAYER_DEATH: &str = "PlayerDeath";

const DEATH_CAUSES: &str = concat!(
    "was slain by .+|was shot by .+|was blown up by .+|was killed by .+|",
    "drowned|blew up|burned to death|hit the ground too hard|fell from a high place|",
    "fell out of the world|starved to death|suffocated in a wall|tried to swim in lava|",
    "was pricked to death|experienced kinetic energy|froze to death|died"
);

/// 내장 규칙 목록 (선언 순서가 매칭 우선순위)
pub fn default_rules() -> Vec<LineRule> {
    vec![
        LineRule::new(
            r#"Done \((?P<startup_secs>[0-9.]+)s\)! For help, type "help""#,
            KIND_SERVER_READY,
            &[],
        ),
        LineRule::new(
            r"(?:^|: )<(?P<player_name>\w+)> (?P<message>.*)$",
            KIND_PLAYER_CHAT,
            &[],
        ),
        LineRule::new(
            r"(?:^|: )(?P<player_name>\w+) joined the game$",
            KIND_PLAYER_JOIN,
            &[],
        ),
        LineRule::new(
            r"(?:^|: )(?P<player_name>\w+) left the game$",
            KIND_PLAYER_LEAVE,
            &[],
        ),
        LineRule::new(
            format!(r"(?:^|: )(?P<player_name>\w+) (?P<cause>{DEATH_CAUSES})$"),
            KIND_PLAYER_DEATH,
            &[],
        ),
    ]
}
