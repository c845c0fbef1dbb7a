mod table_editor_test;
