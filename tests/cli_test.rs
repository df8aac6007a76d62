use partymix::cli::{PlayerInput, parse_player_input};

#[test]
fn test_navigation_commands() {
    assert_eq!(parse_player_input("n"), Some(PlayerInput::Next));
    assert_eq!(parse_player_input("NEXT"), Some(PlayerInput::Next));
    assert_eq!(parse_player_input("p"), Some(PlayerInput::Previous));
    assert_eq!(parse_player_input("prev"), Some(PlayerInput::Previous));
    assert_eq!(parse_player_input(" previous "), Some(PlayerInput::Previous));
}

#[test]
fn test_toggle_inputs() {
    assert_eq!(parse_player_input("t"), Some(PlayerInput::Toggle));
    assert_eq!(parse_player_input("toggle"), Some(PlayerInput::Toggle));
    assert_eq!(parse_player_input("space"), Some(PlayerInput::Toggle));
    assert_eq!(parse_player_input(" "), Some(PlayerInput::Toggle));
    assert_eq!(parse_player_input(""), None);
}

#[test]
fn test_seek_takes_seconds() {
    assert_eq!(parse_player_input("seek 90"), Some(PlayerInput::Seek(90_000)));
    assert_eq!(parse_player_input("s 0"), Some(PlayerInput::Seek(0)));
    assert_eq!(parse_player_input("seek"), None);
    assert_eq!(parse_player_input("seek soon"), None);
    assert_eq!(parse_player_input("seek 1 2"), None);
}

#[test]
fn test_row_numbers_play_candidates() {
    assert_eq!(parse_player_input("3"), Some(PlayerInput::Play(3)));
    assert_eq!(parse_player_input("0"), None);
    assert_eq!(parse_player_input("-1"), None);
}

#[test]
fn test_session_commands() {
    assert_eq!(parse_player_input("d"), Some(PlayerInput::Dismiss));
    assert_eq!(parse_player_input("reconnect"), Some(PlayerInput::Reconnect));
    assert_eq!(parse_player_input("q"), Some(PlayerInput::Quit));
    assert_eq!(parse_player_input("exit"), Some(PlayerInput::Quit));
    assert_eq!(parse_player_input("dance"), None);
    assert_eq!(parse_player_input("next please"), None);
}
