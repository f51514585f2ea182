//! Integration tests for the line wire format, using datagrams shaped the
//! way other peer implementations actually send them.

use pokelink_protocol::{
    BattleSetup, CalculationReport, ChatContent, Codec, CommunicationMode, Envelope, LineCodec,
    Message, Packet, ProtocolError, Value,
};

fn decode(text: &str) -> Result<Envelope, ProtocolError> {
    LineCodec.decode(text.as_bytes())
}

// =========================================================================
// Decoding foreign datagrams
// =========================================================================

#[test]
fn test_decode_battle_setup_with_spaced_json_boosts() {
    let envelope = decode(
        "message_type: BATTLE_SETUP\n\
         communication_mode: P2P\n\
         pokemon_name: Pikachu\n\
         stat_boosts: {\"special_attack_uses\": 5, \"special_defense_uses\": 5}\n\
         sequence_number: 2\n",
    )
    .unwrap();

    assert_eq!(envelope.seq, Some(2));
    assert_eq!(
        envelope.message,
        Message::BattleSetup(BattleSetup {
            communication_mode: CommunicationMode::P2P,
            pokemon_name: "Pikachu".into(),
            special_attack_uses: 5,
            special_defense_uses: 5,
        })
    );
    assert!(envelope.extra.is_empty());
}

#[test]
fn test_decode_calculation_report_with_status_message() {
    let envelope = decode(
        "message_type: CALCULATION_REPORT\n\
         attacker: Pikachu\n\
         move_used: Thunderbolt\n\
         remaining_health: 35\n\
         damage_dealt: 80\n\
         defender_hp_remaining: 0\n\
         status_message: Pikachu used Thunderbolt! It was super effective!\n\
         sequence_number: 9\n",
    )
    .unwrap();

    let Message::CalculationReport(report) = envelope.message else {
        panic!("expected CalculationReport, got {:?}", envelope.message);
    };
    assert_eq!(report.damage_dealt, 80);
    assert_eq!(report.defender_hp_remaining, 0);
    assert_eq!(report.remaining_health, Some(35));
    assert_eq!(
        report.status_message.as_deref(),
        Some("Pikachu used Thunderbolt! It was super effective!")
    );
}

#[test]
fn test_decode_request_without_sequence_number() {
    let envelope = decode("message_type: HANDSHAKE_REQUEST\n").unwrap();
    assert_eq!(envelope.message, Message::HandshakeRequest);
    assert_eq!(envelope.seq, None);
}

#[test]
fn test_decode_sticker_chat() {
    let envelope = decode(
        "message_type: CHAT_MESSAGE\n\
         sender_name: Misty\n\
         content_type: STICKER\n\
         sticker_data: iVBORw0KGgo=\n",
    )
    .unwrap();
    let Message::Chat(chat) = envelope.message else {
        panic!("expected Chat");
    };
    assert_eq!(chat.sender_name, "Misty");
    assert_eq!(chat.content, ChatContent::Sticker("iVBORw0KGgo=".into()));
}

#[test]
fn test_decode_unknown_fields_are_preserved_and_reencoded() {
    let codec = LineCodec;
    let envelope = decode(
        "message_type: DEFENSE_ANNOUNCE\n\
         sequence_number: 4\n\
         client_version: 007\n",
    )
    .unwrap();
    assert_eq!(
        envelope.extra.get("client_version"),
        Some(&Value::Text("007".into()))
    );

    let text = String::from_utf8(codec.encode(&envelope).unwrap()).unwrap();
    assert!(text.ends_with("client_version: 007\n"));
}

#[test]
fn test_decode_missing_required_field_is_invalid() {
    let err = decode("message_type: ATTACK_ANNOUNCE\nsequence_number: 3\n").unwrap_err();
    assert_eq!(
        err,
        ProtocolError::InvalidField {
            field: "move_name",
            reason: "missing".into(),
        }
    );
}

#[test]
fn test_decode_negative_sequence_number_is_invalid() {
    let err = decode("message_type: DEFENSE_ANNOUNCE\nsequence_number: -1\n").unwrap_err();
    assert!(matches!(
        err,
        ProtocolError::InvalidField {
            field: "sequence_number",
            ..
        }
    ));
}

// =========================================================================
// Round trip
// =========================================================================

#[test]
fn test_encode_decode_round_trip_preserves_every_kind() {
    let codec = LineCodec;
    let messages = vec![
        Message::HandshakeRequest,
        Message::HandshakeResponse { seed: 123_456 },
        Message::SpectatorRequest,
        Message::SpectatorResponse,
        Message::BattleSetup(BattleSetup {
            communication_mode: CommunicationMode::Broadcast,
            pokemon_name: "Mr. Mime".into(),
            special_attack_uses: 2,
            special_defense_uses: 0,
        }),
        Message::AttackAnnounce {
            move_name: "Flamethrower".into(),
        },
        Message::DefenseAnnounce,
        Message::CalculationReport(CalculationReport {
            attacker: "Charmander".into(),
            move_used: "Ember".into(),
            remaining_health: Some(39),
            damage_dealt: 12,
            defender_hp_remaining: 33,
            status_message: Some("Charmander used Ember!".into()),
        }),
        Message::CalculationConfirm,
        Message::GameOver {
            winner: "Pikachu".into(),
            loser: "Bulbasaur".into(),
        },
        Message::Chat(pokelink_protocol::ChatMessage::text("Brock", "42")),
    ];

    for (i, message) in messages.into_iter().enumerate() {
        let mut envelope = Envelope::new(message);
        envelope.seq = Some(i as u64 + 1);
        let bytes = codec.encode(&envelope).unwrap();
        assert_eq!(
            codec.decode_packet(&bytes).unwrap(),
            Packet::Message(envelope),
            "round trip failed for datagram:\n{}",
            String::from_utf8_lossy(&bytes)
        );
    }
}

#[test]
fn test_round_trip_json_shaped_text_fields_stay_text() {
    let codec = LineCodec;
    let messages = vec![
        Message::AttackAnnounce {
            move_name: "{}".into(),
        },
        Message::AttackAnnounce {
            move_name: r#"{"power": 90}"#.into(),
        },
        Message::GameOver {
            winner: "{ }".into(),
            loser: r#"{"a":{"b":1}}"#.into(),
        },
        Message::Chat(pokelink_protocol::ChatMessage::text(
            "{}",
            r#"{"hello": "world", "n": 1.5}"#,
        )),
    ];

    for message in messages {
        let mut envelope = Envelope::new(message);
        envelope.seq = Some(5);
        let bytes = codec.encode(&envelope).unwrap();
        assert_eq!(
            codec.decode_packet(&bytes).unwrap(),
            Packet::Message(envelope),
            "round trip failed for datagram:\n{}",
            String::from_utf8_lossy(&bytes)
        );
    }
}

#[test]
fn test_decode_json_shaped_unknown_field_reencodes_verbatim() {
    let codec = LineCodec;
    let envelope = decode(
        "message_type: CALCULATION_CONFIRM\n\
         sequence_number: 8\n\
         trainer_card: { \"badges\" : 3 }\n",
    )
    .unwrap();
    let card = envelope.extra.get("trainer_card").unwrap();
    assert_eq!(card.as_document().unwrap().get("badges"), Some(&Value::Int(3)));

    let text = String::from_utf8(codec.encode(&envelope).unwrap()).unwrap();
    assert!(text.ends_with("trainer_card: { \"badges\" : 3 }\n"));
}

#[test]
fn test_ack_frame_is_never_a_message() {
    let codec = LineCodec;
    let bytes = codec.encode_ack(17);
    assert_eq!(bytes, b"ACK:17");
    assert!(codec.decode(&bytes).is_err());
    assert_eq!(codec.decode_packet(&bytes).unwrap(), Packet::Ack(17));
}
