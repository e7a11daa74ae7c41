// Table definitions matching the DDL in `Database::ensure_tables`.

diesel::table! {
    entries (id) {
        id -> Text,
        created_at -> Nullable<Text>,
        updated_at -> Nullable<Text>,
        deleted_at -> Nullable<Text>,
        sha1_hash -> Nullable<Text>,
        title -> Nullable<Text>,
        authors -> Nullable<Text>,
        file_creation_date -> Nullable<Text>,
        file_modification_date -> Nullable<Text>,
        file_size -> Nullable<BigInt>,
        plain_text -> Nullable<Text>,
        language -> Nullable<Text>,
        ts_created_at -> Nullable<Text>,
        ts_updated_at -> Nullable<Text>,
        ts_creation_date -> Nullable<Text>,
        ts_modification_date -> Nullable<Text>,
        files_pdf -> Nullable<Text>,
        files_text -> Nullable<Text>,
        files_img -> Nullable<Text>,
    }
}

diesel::table! {
    sources (id) {
        id -> Text,
        created_at -> Nullable<Text>,
        updated_at -> Nullable<Text>,
        deleted_at -> Nullable<Text>,
        name -> Nullable<Text>,
        url -> Nullable<Text>,
        description -> Nullable<Text>,
        reports -> Nullable<Text>,
    }
}

diesel::table! {
    entries_sources (entry_id, source_id) {
        entry_id -> Text,
        source_id -> Text,
    }
}

diesel::table! {
    references (id) {
        id -> Integer,
        entry_id -> Text,
        reference -> Text,
    }
}

diesel::table! {
    report_names (id) {
        id -> Integer,
        entry_id -> Text,
        report_name -> Text,
    }
}

diesel::table! {
    threat_actors (id) {
        id -> Text,
        created_at -> Nullable<Text>,
        updated_at -> Nullable<Text>,
        deleted_at -> Nullable<Text>,
        main_name -> Nullable<Text>,
        source_name -> Nullable<Text>,
        tools -> Text,
        source_id -> Nullable<Text>,
        reports -> Nullable<Text>,
    }
}

diesel::table! {
    threat_actors_aliases (threat_actor_id, alias) {
        threat_actor_id -> Text,
        alias -> Text,
    }
}

diesel::table! {
    entries_threat_actors (entry_id, threat_actor_id) {
        entry_id -> Text,
        threat_actor_id -> Text,
    }
}
